//! Event Publisher Adapters
//!
//! Lifecycle events either go to the tracing output of the binary or are
//! recorded for assertions in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::domain::events::LifecycleEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Writes each lifecycle event as one structured `info` record, with the
/// serialized event in the `event` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: LifecycleEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        info!(
            event_type = event.event_type(),
            id = event.resource_id(),
            at = %event.timestamp(),
            event = %payload,
            "Lifecycle event"
        );
        Ok(())
    }
}

/// Records events in publication order.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    recorded: Mutex<Vec<LifecycleEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.recorded.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }

    /// Recorded events whose type name is `event_type`.
    pub fn events_of_type(&self, event_type: &str) -> Vec<LifecycleEvent> {
        self.recorded
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Type names of the recorded events, in order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.recorded.lock().iter().map(LifecycleEvent::event_type).collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: LifecycleEvent) -> Result<()> {
        self.recorded.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_publisher_accepts_every_event() {
        let events = vec![
            LifecycleEvent::create_submitted("default/dv", "http"),
            LifecycleEvent::metadata_patched("default/dv", vec!["/metadata/labels".to_string()]),
            LifecycleEvent::deleted("default/dv", 2),
        ];
        LoggingEventPublisher.publish_all(events).await.unwrap();
    }

    #[tokio::test]
    async fn test_collector_records_in_order() {
        let collector = InMemoryEventCollector::new();
        assert!(collector.is_empty());

        collector
            .publish_all(vec![
                LifecycleEvent::create_submitted("default/a", "http"),
                LifecycleEvent::phase_observed("default/a", "ImportInProgress", "10.0%"),
                LifecycleEvent::create_submitted("default/b", "pvc"),
            ])
            .await
            .unwrap();

        assert_eq!(collector.events().len(), 3);
        assert_eq!(collector.events_of_type("CreateSubmitted").len(), 2);
        assert_eq!(
            collector.event_types(),
            vec!["CreateSubmitted", "PhaseObserved", "CreateSubmitted"]
        );
        assert_eq!(collector.events()[1].resource_id(), "default/a");
    }
}
