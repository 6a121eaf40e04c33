//! DataVolume spec and source blocks

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::volume_claim::{expand_volume_claim_spec, flatten_volume_claim_spec, VolumeClaimSpecBlock};
use crate::crd::{
    ContentType, DataVolumeSource, DataVolumeSourceHttp, DataVolumeSourcePvc, DataVolumeSpec,
};
use crate::error::Result;

/// Desired state of the DataVolume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpecBlock {
    /// Source of the data for the requested DataVolume
    pub source: Vec<SourceBlock>,

    /// Claim to provision for the data
    pub pvc: Vec<VolumeClaimSpecBlock>,

    /// `kubevirt` or `archive`
    pub content_type: String,
}

/// Source of the data. Exactly one of `http` or `pvc` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SourceBlock {
    pub http: Vec<HttpSourceBlock>,
    pub pvc: Vec<PvcSourceBlock>,
}

/// Import from an HTTP(S) endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HttpSourceBlock {
    /// URL of the http source
    pub url: String,

    /// Secret needed to access the HTTP source
    pub secret_ref: String,

    /// ConfigMap holding the registry certificates
    pub cert_config_map: String,
}

/// Clone an existing claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PvcSourceBlock {
    /// Namespace the source claim lives in
    pub namespace: String,

    /// Name of the source claim
    pub name: String,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// =============================================================================
// Expanders
// =============================================================================

pub fn expand_data_volume_spec(blocks: &[SpecBlock]) -> Result<DataVolumeSpec> {
    let Some(block) = blocks.first() else {
        return Ok(DataVolumeSpec::default());
    };

    Ok(DataVolumeSpec {
        source: expand_data_volume_source(&block.source),
        pvc: expand_volume_claim_spec(&block.pvc)?,
        // Unrecognized values are rejected by schema validation beforehand
        content_type: block.content_type.parse::<ContentType>().ok(),
    })
}

/// The first populated variant wins; validation rejects blocks that set both.
pub fn expand_data_volume_source(blocks: &[SourceBlock]) -> Option<DataVolumeSource> {
    let block = blocks.first()?;

    if let Some(http) = block.http.first() {
        return Some(DataVolumeSource::Http(DataVolumeSourceHttp {
            url: http.url.clone(),
            secret_ref: non_empty(&http.secret_ref),
            cert_config_map: non_empty(&http.cert_config_map),
        }));
    }
    block.pvc.first().map(|pvc| {
        DataVolumeSource::Pvc(DataVolumeSourcePvc {
            namespace: pvc.namespace.clone(),
            name: non_empty(&pvc.name),
        })
    })
}

// =============================================================================
// Flatteners
// =============================================================================

pub fn flatten_data_volume_spec(spec: &DataVolumeSpec) -> Vec<SpecBlock> {
    vec![SpecBlock {
        source: flatten_data_volume_source(spec.source.as_ref()),
        pvc: flatten_volume_claim_spec(&spec.pvc),
        content_type: spec
            .content_type
            .map(|c| c.to_string())
            .unwrap_or_default(),
    }]
}

pub fn flatten_data_volume_source(source: Option<&DataVolumeSource>) -> Vec<SourceBlock> {
    let block = match source {
        Some(DataVolumeSource::Http(http)) => SourceBlock {
            http: vec![HttpSourceBlock {
                url: http.url.clone(),
                secret_ref: http.secret_ref.clone().unwrap_or_default(),
                cert_config_map: http.cert_config_map.clone().unwrap_or_default(),
            }],
            ..Default::default()
        },
        Some(DataVolumeSource::Pvc(pvc)) => SourceBlock {
            pvc: vec![PvcSourceBlock {
                namespace: pvc.namespace.clone(),
                name: pvc.name.clone().unwrap_or_default(),
            }],
            ..Default::default()
        },
        // Kinds the configuration cannot express flatten to an empty block
        Some(DataVolumeSource::Other(_)) | None => SourceBlock::default(),
    };
    vec![block]
}
