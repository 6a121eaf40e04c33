//! Lifecycle Events
//!
//! Immutable records of what the controller did to a DataVolume. Published
//! through [`EventPublisher`](super::ports::EventPublisher) for audit logging
//! and for assertions in tests.
//!
//! # Example
//!
//! ```ignore
//! let event = LifecycleEvent::converged("default/fedora", "Succeeded", 3, elapsed);
//! event_publisher.publish(event).await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle event of a managed DataVolume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    // =========================================================================
    // Create
    // =========================================================================
    /// The create request was accepted by the server.
    CreateSubmitted {
        id: String,
        source: String,
        timestamp: DateTime<Utc>,
    },

    /// A phase was observed while waiting.
    PhaseObserved {
        id: String,
        phase: String,
        progress: String,
        timestamp: DateTime<Utc>,
    },

    /// The object reached its terminal success phase.
    Converged {
        id: String,
        phase: String,
        polls: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The object reached its failure phase.
    ConvergenceFailed {
        id: String,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// The wait deadline passed before a terminal phase.
    ConvergenceTimedOut {
        id: String,
        last_state: String,
        timeout_ms: u64,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Update
    // =========================================================================
    /// A metadata patch was applied.
    MetadataPatched {
        id: String,
        paths: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Delete
    // =========================================================================
    /// The delete request was accepted (or the object was already gone).
    DeleteSubmitted {
        id: String,
        timestamp: DateTime<Utc>,
    },

    /// The object is no longer visible on the server.
    Deleted {
        id: String,
        polls: u32,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LifecycleEvent::CreateSubmitted { timestamp, .. }
            | LifecycleEvent::PhaseObserved { timestamp, .. }
            | LifecycleEvent::Converged { timestamp, .. }
            | LifecycleEvent::ConvergenceFailed { timestamp, .. }
            | LifecycleEvent::ConvergenceTimedOut { timestamp, .. }
            | LifecycleEvent::MetadataPatched { timestamp, .. }
            | LifecycleEvent::DeleteSubmitted { timestamp, .. }
            | LifecycleEvent::Deleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::CreateSubmitted { .. } => "CreateSubmitted",
            LifecycleEvent::PhaseObserved { .. } => "PhaseObserved",
            LifecycleEvent::Converged { .. } => "Converged",
            LifecycleEvent::ConvergenceFailed { .. } => "ConvergenceFailed",
            LifecycleEvent::ConvergenceTimedOut { .. } => "ConvergenceTimedOut",
            LifecycleEvent::MetadataPatched { .. } => "MetadataPatched",
            LifecycleEvent::DeleteSubmitted { .. } => "DeleteSubmitted",
            LifecycleEvent::Deleted { .. } => "Deleted",
        }
    }

    /// Identity of the DataVolume the event refers to.
    pub fn resource_id(&self) -> &str {
        match self {
            LifecycleEvent::CreateSubmitted { id, .. }
            | LifecycleEvent::PhaseObserved { id, .. }
            | LifecycleEvent::Converged { id, .. }
            | LifecycleEvent::ConvergenceFailed { id, .. }
            | LifecycleEvent::ConvergenceTimedOut { id, .. }
            | LifecycleEvent::MetadataPatched { id, .. }
            | LifecycleEvent::DeleteSubmitted { id, .. }
            | LifecycleEvent::Deleted { id, .. } => id,
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl LifecycleEvent {
    pub fn create_submitted(id: impl Into<String>, source: impl Into<String>) -> Self {
        LifecycleEvent::CreateSubmitted {
            id: id.into(),
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn phase_observed(
        id: impl Into<String>,
        phase: impl Into<String>,
        progress: impl Into<String>,
    ) -> Self {
        LifecycleEvent::PhaseObserved {
            id: id.into(),
            phase: phase.into(),
            progress: progress.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn converged(
        id: impl Into<String>,
        phase: impl Into<String>,
        polls: u32,
        duration: Duration,
    ) -> Self {
        LifecycleEvent::Converged {
            id: id.into(),
            phase: phase.into(),
            polls,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn convergence_failed(id: impl Into<String>, phase: impl Into<String>) -> Self {
        LifecycleEvent::ConvergenceFailed {
            id: id.into(),
            phase: phase.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn convergence_timed_out(
        id: impl Into<String>,
        last_state: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        LifecycleEvent::ConvergenceTimedOut {
            id: id.into(),
            last_state: last_state.into(),
            timeout_ms: timeout.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn metadata_patched(id: impl Into<String>, paths: Vec<String>) -> Self {
        LifecycleEvent::MetadataPatched {
            id: id.into(),
            paths,
            timestamp: Utc::now(),
        }
    }

    pub fn delete_submitted(id: impl Into<String>) -> Self {
        LifecycleEvent::DeleteSubmitted {
            id: id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn deleted(id: impl Into<String>, polls: u32) -> Self {
        LifecycleEvent::Deleted {
            id: id.into(),
            polls,
            timestamp: Utc::now(),
        }
    }
}
