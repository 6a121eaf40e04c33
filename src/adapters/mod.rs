//! Infrastructure Adapters
//!
//! Implementations of the domain ports.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Domain Layer                         │
//! │            DataVolumeStore │ EventPublisher                │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                  Adapters (This Module)                    │
//! │  KubernetesDataVolumeStore │ InMemoryDataVolumeStore       │
//! │  LoggingEventPublisher     │ InMemoryEventCollector        │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use datavolume_provider::adapters::KubernetesDataVolumeStore;
//! use datavolume_provider::domain::DataVolumeStore;
//!
//! let store = KubernetesDataVolumeStore::try_default().await?;
//! let dv = store.read_data_volume("images", "fedora").await?;
//! ```

mod event_publisher;
mod kubernetes;
mod memory;

pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use kubernetes::KubernetesDataVolumeStore;
pub use memory::{InMemoryDataVolumeStore, ReadBehaviour, StoreCall};
