//! Schema-level validation of configuration documents
//!
//! Runs before expansion so that expansion itself can stay total.

use super::DataVolumeConfig;
use crate::crd::{ContentType, DataVolumePhase};
use crate::error::{Error, Result};

fn at_most_one<T>(path: &str, blocks: &[T]) -> Result<()> {
    if blocks.len() > 1 {
        return Err(Error::Validation(format!(
            "{}: at most one block allowed, got {}",
            path,
            blocks.len()
        )));
    }
    Ok(())
}

/// Accepts an empty string, an integer in 0..=100, or the decimal
/// percentage form CDI reports (e.g. `42.50%`).
fn validate_progress(progress: &str) -> Result<()> {
    if progress.is_empty() || progress == "N/A" {
        return Ok(());
    }
    let number = progress.strip_suffix('%').unwrap_or(progress);
    match number.parse::<f64>() {
        Ok(v) if (0.0..=100.0).contains(&v) => Ok(()),
        _ => Err(Error::Validation(format!(
            "status.0.progress: {:?} is not a percentage between 0 and 100",
            progress
        ))),
    }
}

impl DataVolumeConfig {
    /// Check the document against the resource schema.
    pub fn validate(&self) -> Result<()> {
        at_most_one("metadata", &self.metadata)?;
        at_most_one("spec", &self.spec)?;
        at_most_one("status", &self.status)?;

        let meta = self
            .metadata
            .first()
            .ok_or_else(|| Error::Validation("metadata: required block is missing".to_string()))?;
        if meta.name.is_empty() && meta.generate_name.is_empty() {
            return Err(Error::Validation(
                "metadata.0: one of name or generate_name must be set".to_string(),
            ));
        }

        let spec = self
            .spec
            .first()
            .ok_or_else(|| Error::Validation("spec: required block is missing".to_string()))?;

        at_most_one("spec.0.source", &spec.source)?;
        at_most_one("spec.0.pvc", &spec.pvc)?;

        let source = spec.source.first().ok_or_else(|| {
            Error::Validation("spec.0.source: required block is missing".to_string())
        })?;
        at_most_one("spec.0.source.0.http", &source.http)?;
        at_most_one("spec.0.source.0.pvc", &source.pvc)?;

        match (source.http.first(), source.pvc.first()) {
            (Some(http), None) => {
                if http.url.is_empty() {
                    return Err(Error::Validation(
                        "spec.0.source.0.http.0.url: required field is empty".to_string(),
                    ));
                }
            }
            (None, Some(pvc)) => {
                if pvc.namespace.is_empty() {
                    return Err(Error::Validation(
                        "spec.0.source.0.pvc.0.namespace: required field is empty".to_string(),
                    ));
                }
            }
            _ => {
                return Err(Error::Validation(
                    "spec.0.source.0: exactly one of http or pvc must be set".to_string(),
                ))
            }
        }

        if !spec.content_type.is_empty() {
            spec.content_type.parse::<ContentType>()?;
        }

        if let Some(status) = self.status.first() {
            if DataVolumePhase::parse(&status.phase).is_none() {
                return Err(Error::Validation(format!(
                    "status.0.phase: unknown phase {:?}",
                    status.phase
                )));
            }
            validate_progress(&status.progress)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{HttpSourceBlock, MetadataBlock, PvcSourceBlock, SourceBlock, SpecBlock, StatusBlock};
    use super::*;
    use assert_matches::assert_matches;

    fn valid_config() -> DataVolumeConfig {
        DataVolumeConfig {
            metadata: vec![MetadataBlock {
                name: "dv".to_string(),
                ..Default::default()
            }],
            spec: vec![SpecBlock {
                source: vec![SourceBlock {
                    http: vec![HttpSourceBlock {
                        url: "https://example.com/disk.img".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            status: vec![],
        }
    }

    fn assert_invalid(config: &DataVolumeConfig, needle: &str) {
        assert_matches!(
            config.validate(),
            Err(Error::Validation(msg)) if msg.contains(needle),
            "expected error mentioning {:?}",
            needle
        );
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_metadata() {
        let mut config = valid_config();
        config.metadata.clear();
        assert_invalid(&config, "metadata: required");
    }

    #[test]
    fn test_missing_spec() {
        let mut config = valid_config();
        config.spec.clear();
        assert_invalid(&config, "spec: required");
    }

    #[test]
    fn test_both_sources_rejected() {
        let mut config = valid_config();
        config.spec[0].source[0].pvc = vec![PvcSourceBlock {
            namespace: "golden".to_string(),
            ..Default::default()
        }];
        assert_invalid(&config, "exactly one of http or pvc");
    }

    #[test]
    fn test_no_source_variant_rejected() {
        let mut config = valid_config();
        config.spec[0].source[0] = SourceBlock::default();
        assert_invalid(&config, "exactly one of http or pvc");
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut config = valid_config();
        config.spec[0].source[0].http[0].url.clear();
        assert_invalid(&config, "url");
    }

    #[test]
    fn test_duplicate_blocks_rejected() {
        let mut config = valid_config();
        config.metadata.push(MetadataBlock::default());
        assert_invalid(&config, "metadata: at most one block");
    }

    #[test]
    fn test_content_type_rejected() {
        let mut config = valid_config();
        config.spec[0].content_type = "raw".to_string();
        assert_invalid(&config, "content type");
    }

    #[test]
    fn test_missing_name_rejected() {
        let mut config = valid_config();
        config.metadata[0].name.clear();
        assert_invalid(&config, "name or generate_name");

        config.metadata[0].generate_name = "dv-".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_status_fields() {
        let mut config = valid_config();
        config.status = vec![StatusBlock {
            phase: "Succeeded".to_string(),
            progress: "100.0%".to_string(),
        }];
        assert!(config.validate().is_ok());

        config.status[0].progress = "101".to_string();
        assert_invalid(&config, "progress");

        config.status[0].progress = "50".to_string();
        config.status[0].phase = "Finished".to_string();
        assert_invalid(&config, "unknown phase");
    }
}
