//! Domain event abstractions.

use std::any::Any;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier, assigned when the event is raised.
    pub event_id: Uuid,
    /// Type tag used to resolve the concrete event on read-back.
    pub event_type: String,
    /// Aggregate that raised this event.
    pub aggregate_id: Uuid,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Builds metadata for a freshly raised event.
    ///
    /// Event ids are UUIDv7 so they sort roughly by creation time.
    #[must_use]
    pub fn raise(
        event_type: &str,
        aggregate_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.to_owned(),
            aggregate_id,
            correlation_id,
            occurred_at: clock.now(),
        }
    }
}

/// Trait that all domain events implement.
///
/// The trait is object safe so that events of different concrete types can
/// travel together through the outbox as `Box<dyn DomainEvent>`.
pub trait DomainEvent: Send + Sync + std::fmt::Debug + Any {
    /// Returns the event type tag (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the whole event, metadata included, to JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the event cannot be
    /// represented as JSON.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Upcast used by typed handlers to recover the concrete event.
    fn as_any(&self) -> &dyn Any;
}
