//! DataVolume status block (server-observed only)

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{DataVolumePhase, DataVolumeStatus};

/// Observed state of the DataVolume. Populated from the cluster; never
/// submitted as desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StatusBlock {
    /// Current phase of the DataVolume
    pub phase: String,

    /// Import progress as reported by CDI
    pub progress: String,
}

pub fn expand_data_volume_status(blocks: &[StatusBlock]) -> Option<DataVolumeStatus> {
    blocks.first().map(|block| DataVolumeStatus {
        phase: DataVolumePhase::from(block.phase.clone()),
        progress: block.progress.clone(),
    })
}

pub fn flatten_data_volume_status(status: Option<&DataVolumeStatus>) -> Vec<StatusBlock> {
    let status = status.cloned().unwrap_or_default();
    vec![StatusBlock {
        phase: status.phase.to_string(),
        progress: status.progress,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_status() {
        let status = expand_data_volume_status(&[StatusBlock {
            phase: "ImportInProgress".to_string(),
            progress: "12.5%".to_string(),
        }])
        .unwrap();
        assert_eq!(status.phase, DataVolumePhase::ImportInProgress);
        assert_eq!(status.progress, "12.5%");

        assert!(expand_data_volume_status(&[]).is_none());
    }

    #[test]
    fn test_flatten_missing_status_emits_empty_block() {
        assert_eq!(
            flatten_data_volume_status(None),
            vec![StatusBlock::default()]
        );
    }
}
