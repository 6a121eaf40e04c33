//! Domain Ports (Port/Adapter Pattern)
//!
//! Abstractions the lifecycle controller depends on. Infrastructure
//! adapters implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Lifecycle Controller                 │
//! │   ┌──────────────────────────────────────────────┐   │
//! │   │               Ports (Traits)                  │   │
//! │   │      DataVolumeStore │ EventPublisher         │   │
//! │   └──────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                 Infrastructure Layer                  │
//! │   KubernetesDataVolumeStore │ InMemoryDataVolumeStore │
//! │   LoggingEventPublisher     │ InMemoryEventCollector  │
//! └──────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::crd::DataVolume;
use crate::error::Result;

use super::events::LifecycleEvent;

// =============================================================================
// Object Store Port
// =============================================================================

/// Remote object store holding DataVolumes.
///
/// Implementations must report an absent object as an error for which
/// [`Error::is_not_found`](crate::error::Error::is_not_found) holds, so the
/// controller can tell it apart from other failures.
///
/// # Example
///
/// ```ignore
/// let dv = store.read_data_volume("default", "fedora").await?;
/// println!("phase: {}", dv.phase());
/// ```
#[async_trait]
pub trait DataVolumeStore: Send + Sync {
    /// Submit a new object. Returns the object as accepted by the server.
    async fn create_data_volume(&self, dv: &DataVolume) -> Result<DataVolume>;

    /// Fetch the current object.
    async fn read_data_volume(&self, namespace: &str, name: &str) -> Result<DataVolume>;

    /// Apply an RFC 6902 JSON patch.
    async fn update_data_volume(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<DataVolume>;

    /// Request deletion. Returns once the request is accepted, not once the
    /// object is gone.
    async fn delete_data_volume(&self, namespace: &str, name: &str) -> Result<()>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: LifecycleEvent) -> Result<()>;

    /// Publish multiple events.
    async fn publish_all(&self, events: Vec<LifecycleEvent>) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}
