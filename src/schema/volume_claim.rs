//! Persistent volume claim spec block
//!
//! The claim the DataVolume provisions for the imported data. Expansion is
//! the one conversion in the provider that can reject its input.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ACCESS_MODES: [&str; 4] = [
    "ReadWriteOnce",
    "ReadOnlyMany",
    "ReadWriteMany",
    "ReadWriteOncePod",
];

pub const VOLUME_MODES: [&str; 2] = ["Filesystem", "Block"];

pub const SELECTOR_OPERATORS: [&str; 4] = ["In", "NotIn", "Exists", "DoesNotExist"];

/// Desired characteristics of the claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VolumeClaimSpecBlock {
    /// Desired access modes of the volume
    pub access_modes: Vec<String>,

    /// Minimum resources the volume should have
    pub resources: Vec<ResourceRequirementsBlock>,

    /// Label query over volumes to consider for binding
    pub selector: Vec<LabelSelectorBlock>,

    /// Binding reference to a specific persistent volume
    pub volume_name: String,

    /// Name of the storage class required by the claim
    pub storage_class_name: String,

    /// `Filesystem` or `Block`
    pub volume_mode: String,
}

/// Compute resources of the claim, as quantity strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ResourceRequirementsBlock {
    pub limits: BTreeMap<String, String>,
    pub requests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LabelSelectorBlock {
    pub match_labels: BTreeMap<String, String>,
    pub match_expressions: Vec<LabelSelectorRequirementBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LabelSelectorRequirementBlock {
    pub key: String,
    /// One of `In`, `NotIn`, `Exists`, `DoesNotExist`
    pub operator: String,
    pub values: Vec<String>,
}

// =============================================================================
// Expanders
// =============================================================================

pub fn expand_volume_claim_spec(blocks: &[VolumeClaimSpecBlock]) -> Result<PersistentVolumeClaimSpec> {
    let Some(block) = blocks.first() else {
        return Ok(PersistentVolumeClaimSpec::default());
    };

    for mode in &block.access_modes {
        if !ACCESS_MODES.contains(&mode.as_str()) {
            return Err(Error::Validation(format!(
                "pvc.access_modes: unsupported access mode {:?}",
                mode
            )));
        }
    }
    if !block.volume_mode.is_empty() && !VOLUME_MODES.contains(&block.volume_mode.as_str()) {
        return Err(Error::Validation(format!(
            "pvc.volume_mode: must be one of {:?}, got {:?}",
            VOLUME_MODES, block.volume_mode
        )));
    }

    Ok(PersistentVolumeClaimSpec {
        access_modes: (!block.access_modes.is_empty()).then(|| block.access_modes.clone()),
        resources: block
            .resources
            .first()
            .map(expand_resource_requirements)
            .transpose()?,
        selector: block.selector.first().map(expand_label_selector).transpose()?,
        volume_name: non_empty(&block.volume_name),
        storage_class_name: non_empty(&block.storage_class_name),
        volume_mode: non_empty(&block.volume_mode),
        ..Default::default()
    })
}

fn expand_resource_requirements(block: &ResourceRequirementsBlock) -> Result<VolumeResourceRequirements> {
    Ok(VolumeResourceRequirements {
        limits: expand_quantities("pvc.resources.limits", &block.limits)?,
        requests: expand_quantities("pvc.resources.requests", &block.requests)?,
    })
}

fn expand_quantities(
    path: &str,
    values: &BTreeMap<String, String>,
) -> Result<Option<BTreeMap<String, Quantity>>> {
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|(name, value)| {
            validate_quantity(value).map_err(|reason| {
                Error::Validation(format!("{}.{}: {:?} {}", path, name, value, reason))
            })?;
            Ok((name.clone(), Quantity(value.clone())))
        })
        .collect::<Result<BTreeMap<_, _>>>()
        .map(Some)
}

fn expand_label_selector(block: &LabelSelectorBlock) -> Result<LabelSelector> {
    let match_expressions = block
        .match_expressions
        .iter()
        .map(|expr| {
            if !SELECTOR_OPERATORS.contains(&expr.operator.as_str()) {
                return Err(Error::Validation(format!(
                    "pvc.selector.match_expressions: unsupported operator {:?}",
                    expr.operator
                )));
            }
            Ok(LabelSelectorRequirement {
                key: expr.key.clone(),
                operator: expr.operator.clone(),
                values: (!expr.values.is_empty()).then(|| expr.values.clone()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LabelSelector {
        match_labels: (!block.match_labels.is_empty()).then(|| block.match_labels.clone()),
        match_expressions: (!match_expressions.is_empty()).then_some(match_expressions),
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Check a Kubernetes resource quantity such as `10Gi`, `500M`, `1.5` or
/// `1e3`. Returns a short reason on failure.
pub fn validate_quantity(s: &str) -> std::result::Result<(), &'static str> {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);

    let number_len = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(body.len());
    let (number, suffix) = body.split_at(number_len);

    if number.is_empty() || number == "." {
        return Err("is not a quantity: missing number");
    }
    if number.matches('.').count() > 1 {
        return Err("is not a quantity: malformed number");
    }

    match suffix {
        "" | "Ki" | "Mi" | "Gi" | "Ti" | "Pi" | "Ei" => Ok(()),
        "n" | "u" | "m" | "k" | "M" | "G" | "T" | "P" | "E" => Ok(()),
        _ => {
            let exponent = suffix
                .strip_prefix(['e', 'E'])
                .ok_or("is not a quantity: unknown suffix")?;
            let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err("is not a quantity: malformed exponent")
            }
        }
    }
}

// =============================================================================
// Flatteners
// =============================================================================

pub fn flatten_volume_claim_spec(spec: &PersistentVolumeClaimSpec) -> Vec<VolumeClaimSpecBlock> {
    vec![VolumeClaimSpecBlock {
        access_modes: spec.access_modes.clone().unwrap_or_default(),
        resources: spec
            .resources
            .iter()
            .map(flatten_resource_requirements)
            .collect(),
        selector: spec.selector.iter().map(flatten_label_selector).collect(),
        volume_name: spec.volume_name.clone().unwrap_or_default(),
        storage_class_name: spec.storage_class_name.clone().unwrap_or_default(),
        volume_mode: spec.volume_mode.clone().unwrap_or_default(),
    }]
}

fn flatten_resource_requirements(resources: &VolumeResourceRequirements) -> ResourceRequirementsBlock {
    let flatten = |m: &Option<BTreeMap<String, Quantity>>| -> BTreeMap<String, String> {
        m.iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.0.clone()))
            .collect()
    };
    ResourceRequirementsBlock {
        limits: flatten(&resources.limits),
        requests: flatten(&resources.requests),
    }
}

fn flatten_label_selector(selector: &LabelSelector) -> LabelSelectorBlock {
    LabelSelectorBlock {
        match_labels: selector.match_labels.clone().unwrap_or_default(),
        match_expressions: selector
            .match_expressions
            .iter()
            .flatten()
            .map(|expr| LabelSelectorRequirementBlock {
                key: expr.key.clone(),
                operator: expr.operator.clone(),
                values: expr.values.clone().unwrap_or_default(),
            })
            .collect(),
    }
}
