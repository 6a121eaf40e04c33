//! Domain Layer
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for the object store and
//!   event sink
//! - **Events** (`events.rs`) - Lifecycle events for audit and tests
//!
//! # Usage
//!
//! ```ignore
//! use datavolume_provider::domain::{DataVolumeStore, EventPublisher};
//!
//! async fn phase_of<S: DataVolumeStore>(store: &S, id: &ResourceId) -> Result<DataVolumePhase> {
//!     Ok(store.read_data_volume(&id.namespace, &id.name).await?.phase())
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::LifecycleEvent;
pub use ports::{DataVolumeStore, EventPublisher};
