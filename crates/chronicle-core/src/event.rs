//! Domain event abstractions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snapshot::SnapshotOrEvent;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata<K, V> {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for routing.
    pub event_type: String,
    /// Aggregate this event belongs to.
    pub aggregate_id: K,
    /// Version the event brings its aggregate to.
    pub version: V,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: SnapshotOrEvent {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata<Self::Id, Self::Version>;
}

/// Sink that receives the events aggregates raise.
pub trait EventBus<E>: Send + Sync {
    /// Publishes a single event.
    fn publish(&self, event: &E);
}

/// Shared handle to an event bus.
pub type SharedEventBus<E> = Arc<dyn EventBus<E>>;

/// Event bus that writes every published event to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventBus;

impl<E: DomainEvent> EventBus<E> for LoggingEventBus {
    fn publish(&self, event: &E) {
        let metadata = event.metadata();
        tracing::info!(
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            version = %event.version(),
            correlation_id = %metadata.correlation_id,
            "domain event published"
        );
    }
}
