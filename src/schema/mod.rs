//! Configuration Schema and State Conversion
//!
//! The configuration side of a DataVolume is a tree of typed blocks. Every
//! nested block is a list holding at most one element, matching the
//! "one nested block" convention of declarative configuration tools.
//!
//! # Conversion
//!
//! ```text
//! DataVolumeConfig ──expand──▶ DataVolume ──(cluster)──▶ DataVolume ──flatten──▶ DataVolumeConfig
//! ```
//!
//! `expand` is total except for claim-spec validation; `flatten` always
//! succeeds and always emits one element per top-level block, so
//! flatten → expand → flatten is stable.

mod metadata;
mod patch;
mod spec;
mod status;
mod validation;
mod volume_claim;

#[cfg(test)]
mod proptest;

use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::DataVolume;
use crate::error::Result;

pub use metadata::{
    expand_metadata, flatten_metadata, is_internal_key, patch_metadata, MetadataBlock,
    DEFAULT_NAMESPACE,
};
pub use patch::patch_paths;
pub use spec::{
    expand_data_volume_source, expand_data_volume_spec, flatten_data_volume_source,
    flatten_data_volume_spec, HttpSourceBlock, PvcSourceBlock, SourceBlock, SpecBlock,
};
pub use status::{expand_data_volume_status, flatten_data_volume_status, StatusBlock};
pub use volume_claim::{
    expand_volume_claim_spec, flatten_volume_claim_spec, validate_quantity,
    LabelSelectorBlock, LabelSelectorRequirementBlock, ResourceRequirementsBlock,
    VolumeClaimSpecBlock,
};

/// Configuration representation of a DataVolume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DataVolumeConfig {
    /// Standard object metadata
    pub metadata: Vec<MetadataBlock>,

    /// Desired state of the DataVolume
    pub spec: Vec<SpecBlock>,

    /// Observed state of the DataVolume (computed)
    pub status: Vec<StatusBlock>,
}

impl DataVolumeConfig {
    /// The metadata block, or an empty one when absent.
    pub fn metadata_block(&self) -> MetadataBlock {
        self.metadata.first().cloned().unwrap_or_default()
    }
}

/// Convert configuration into a DataVolume.
///
/// Absent optional fields become their zero value. Fails only when the
/// embedded claim spec is rejected.
pub fn expand_data_volume(config: &DataVolumeConfig) -> Result<DataVolume> {
    let metadata = expand_metadata(&config.metadata);
    let spec = expand_data_volume_spec(&config.spec)?;

    let mut dv = DataVolume::new(metadata.name.as_deref().unwrap_or_default(), spec);
    dv.metadata = metadata;
    dv.status = expand_data_volume_status(&config.status);
    Ok(dv)
}

/// Convert a DataVolume into configuration.
pub fn flatten_data_volume(dv: &DataVolume) -> DataVolumeConfig {
    DataVolumeConfig {
        metadata: flatten_metadata(&dv.metadata),
        spec: flatten_data_volume_spec(&dv.spec),
        status: flatten_data_volume_status(dv.status.as_ref()),
    }
}

/// JSON schema of the configuration representation.
pub fn resource_schema() -> RootSchema {
    schemars::schema_for!(DataVolumeConfig)
}
