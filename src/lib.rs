//! DataVolume Provider
//!
//! Declarative lifecycle management for CDI `DataVolume` resources: a
//! configuration document is converted to the cluster object, submitted,
//! and polled until the backing volume is populated or has failed.
//!
//! # Architecture
//!
//! ```text
//! DataVolumeConfig ──expand──▶ DataVolume ──▶ DataVolumeStore (cluster)
//!        ▲                                          │
//!        └──────────flatten──── Create/Delete-Wait ◀┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Store and event publisher implementations
//! - [`config`] - Timeouts, polling and duration parsing
//! - [`crd`] - The CDI DataVolume custom resource
//! - [`domain`] - Ports and lifecycle events
//! - [`error`] - Error types
//! - [`identity`] - `namespace/name` identity codec
//! - [`resource`] - Lifecycle controller and local state
//! - [`schema`] - Configuration schema, expand/flatten and validation
//! - [`waiter`] - Bounded polling state machine

pub mod adapters;
pub mod config;
pub mod crd;
pub mod domain;
pub mod error;
pub mod identity;
pub mod resource;
pub mod schema;
pub mod waiter;

// Re-export commonly used types
pub use config::{parse_duration, ProviderConfig, ResourceTimeouts};
pub use crd::{DataVolume, DataVolumePhase, DataVolumeSpec};
pub use error::{Error, Result};
pub use identity::{build_id, parse_id, ResourceId};
pub use resource::{DataVolumeResource, ResourceState};
pub use schema::{expand_data_volume, flatten_data_volume, DataVolumeConfig};
pub use waiter::{PollSchedule, StateChangeConf};
