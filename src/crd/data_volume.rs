//! DataVolume Custom Resource Definition
//!
//! Mirrors the CDI `DataVolume` resource (`cdi.kubevirt.io/v1alpha1`). The CRD
//! itself is installed and owned by CDI, so no schema is generated here.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
use kube::CustomResource;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identity::ResourceId;

// =============================================================================
// DataVolume CRD
// =============================================================================

/// DataVolume is a request to materialize a disk image into a cluster volume.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1alpha1",
    kind = "DataVolume",
    plural = "datavolumes",
    shortname = "dv",
    status = "DataVolumeStatus",
    derive = "PartialEq",
    schema = "disabled",
    namespaced = true
)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSpec {
    /// Where the data comes from. Absent only for objects built from an
    /// incomplete configuration; the API server rejects those.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DataVolumeSource>,

    /// Claim to create for the imported data
    #[serde(default)]
    pub pvc: PersistentVolumeClaimSpec,

    /// How the imported content is interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
}

/// Source of the data for a DataVolume. Exactly one variant is active.
///
/// CDI knows more source kinds than the configuration can express
/// (`blank`, `registry`, `upload`, ...). Objects using them are kept
/// verbatim in [`DataVolumeSource::Other`] so they can still be read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum DataVolumeSource {
    /// Import from an HTTP(S) endpoint
    Http(DataVolumeSourceHttp),
    /// Clone an existing claim
    Pvc(DataVolumeSourcePvc),
    /// Any other source kind, as received from the API server
    Other(Map<String, Value>),
}

impl DataVolumeSource {
    /// Short name of the active variant, as used in configuration blocks.
    pub fn kind(&self) -> &str {
        match self {
            DataVolumeSource::Http(_) => "http",
            DataVolumeSource::Pvc(_) => "pvc",
            DataVolumeSource::Other(raw) => raw.keys().next().map_or("unknown", String::as_str),
        }
    }
}

impl TryFrom<Map<String, Value>> for DataVolumeSource {
    type Error = serde_json::Error;

    fn try_from(mut raw: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        if let Some(http) = raw.remove("http") {
            return Ok(DataVolumeSource::Http(serde_json::from_value(http)?));
        }
        if let Some(pvc) = raw.remove("pvc") {
            return Ok(DataVolumeSource::Pvc(serde_json::from_value(pvc)?));
        }
        Ok(DataVolumeSource::Other(raw))
    }
}

impl Serialize for DataVolumeSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DataVolumeSource::Http(http) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("http", http)?;
                map.end()
            }
            DataVolumeSource::Pvc(pvc) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("pvc", pvc)?;
                map.end()
            }
            DataVolumeSource::Other(raw) => raw.serialize(serializer),
        }
    }
}

/// Parameters to create a DataVolume from an HTTP source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSourceHttp {
    /// URL of the http source
    pub url: String,

    /// Secret holding the credentials needed to access the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,

    /// ConfigMap holding the certificates of the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_config_map: Option<String>,
}

/// Parameters to create a DataVolume by cloning an existing claim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSourcePvc {
    /// Namespace of the source claim
    pub namespace: String,

    /// Name of the source claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// =============================================================================
// Content Type
// =============================================================================

/// Interpretation of the imported content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// A virtual machine disk image
    Kubevirt,
    /// A tar archive extracted into the volume
    Archive,
}

impl ContentType {
    pub const ALL: [ContentType; 2] = [ContentType::Kubevirt, ContentType::Archive];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Kubevirt => "kubevirt",
            ContentType::Archive => "archive",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ContentType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "content type {:?} must be one of \"kubevirt\", \"archive\"",
                    s
                ))
            })
    }
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of a DataVolume, written by the CDI controller only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeStatus {
    /// Current lifecycle phase
    #[serde(default)]
    pub phase: DataVolumePhase,

    /// Import progress, e.g. "42.50%" or "N/A"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub progress: String,
}

/// Lifecycle phase reported by the CDI controller.
///
/// Phases advance roughly as
/// `"" → Pending → PVCBound → *Scheduled → *InProgress → Succeeded | Failed`,
/// with `Unknown` reachable from anywhere. Phase strings this enumeration
/// does not know are observed as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataVolumePhase {
    #[default]
    Unset,
    Pending,
    PVCBound,
    ImportScheduled,
    ImportInProgress,
    CloneScheduled,
    CloneInProgress,
    SnapshotForSmartCloneInProgress,
    SmartClonePVCInProgress,
    UploadScheduled,
    UploadReady,
    Succeeded,
    Failed,
    Unknown,
}

impl DataVolumePhase {
    pub const ALL: [DataVolumePhase; 14] = [
        DataVolumePhase::Unset,
        DataVolumePhase::Pending,
        DataVolumePhase::PVCBound,
        DataVolumePhase::ImportScheduled,
        DataVolumePhase::ImportInProgress,
        DataVolumePhase::CloneScheduled,
        DataVolumePhase::CloneInProgress,
        DataVolumePhase::SnapshotForSmartCloneInProgress,
        DataVolumePhase::SmartClonePVCInProgress,
        DataVolumePhase::UploadScheduled,
        DataVolumePhase::UploadReady,
        DataVolumePhase::Succeeded,
        DataVolumePhase::Failed,
        DataVolumePhase::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataVolumePhase::Unset => "",
            DataVolumePhase::Pending => "Pending",
            DataVolumePhase::PVCBound => "PVCBound",
            DataVolumePhase::ImportScheduled => "ImportScheduled",
            DataVolumePhase::ImportInProgress => "ImportInProgress",
            DataVolumePhase::CloneScheduled => "CloneScheduled",
            DataVolumePhase::CloneInProgress => "CloneInProgress",
            DataVolumePhase::SnapshotForSmartCloneInProgress => "SnapshotForSmartCloneInProgress",
            DataVolumePhase::SmartClonePVCInProgress => "SmartClonePVCInProgress",
            DataVolumePhase::UploadScheduled => "UploadScheduled",
            DataVolumePhase::UploadReady => "UploadReady",
            DataVolumePhase::Succeeded => "Succeeded",
            DataVolumePhase::Failed => "Failed",
            DataVolumePhase::Unknown => "Unknown",
        }
    }

    /// Look up a phase by its exact wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// True for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DataVolumePhase::Succeeded | DataVolumePhase::Failed)
    }
}

impl fmt::Display for DataVolumePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DataVolumePhase {
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or(DataVolumePhase::Unknown)
    }
}

impl From<DataVolumePhase> for String {
    fn from(phase: DataVolumePhase) -> Self {
        phase.as_str().to_string()
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl DataVolume {
    /// Identity key of this object
    pub fn resource_id(&self) -> Result<ResourceId> {
        ResourceId::from_meta(&self.metadata)
    }

    /// Current phase, `Unset` when no status has been reported yet
    pub fn phase(&self) -> DataVolumePhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Current progress string, empty when no status has been reported yet
    pub fn progress(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.progress.as_str())
            .unwrap_or_default()
    }
}
