//! Managed resources
//!
//! The lifecycle controller and the local state it maintains between
//! invocations.

mod data_volume;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::ResourceId;
use crate::schema::DataVolumeConfig;

pub use data_volume::{DataVolumeResource, STATE_CREATING, STATE_DELETING};

/// Local record of a managed DataVolume: its identity (once created) and
/// the last known configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// `namespace/name`, absent until the object has been created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub config: DataVolumeConfig,
}

impl ResourceState {
    pub fn new(config: DataVolumeConfig) -> Self {
        Self { id: None, config }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            config: DataVolumeConfig::default(),
        }
    }

    pub fn set_id(&mut self, id: &ResourceId) {
        self.id = Some(id.to_string());
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Read a state file written by [`ResourceState::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// Load a configuration document. `.json` files are parsed as JSON,
/// anything else as YAML.
pub fn load_config(path: &Path) -> Result<DataVolumeConfig> {
    let raw = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&raw)?),
        _ => Ok(serde_yaml::from_str(&raw)?),
    }
}
