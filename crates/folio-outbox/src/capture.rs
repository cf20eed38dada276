//! Capture of pending domain events into outbox envelopes.

use std::sync::Arc;

use folio_core::aggregate::EventSource;
use folio_core::error::DomainError;
use folio_core::outbox::OutboxEnvelope;
use tracing::debug;

use crate::registry::EventTypeRegistry;

/// Turns the events pending on a set of aggregates into envelopes.
///
/// Runs inside the caller's unit of work, just before its business writes
/// are persisted, so envelopes and state changes commit together.
#[derive(Debug, Clone)]
pub struct EventCapture {
    registry: Arc<EventTypeRegistry>,
}

impl EventCapture {
    /// Creates a capture step that encodes with `registry`.
    #[must_use]
    pub fn new(registry: Arc<EventTypeRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry used for encoding.
    #[must_use]
    pub fn registry(&self) -> &EventTypeRegistry {
        &self.registry
    }

    /// Drains every source and encodes the drained events, in source order
    /// and then raise order.
    ///
    /// Sources are drained even when encoding fails, so a failed capture
    /// cannot leak events into a later save.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if any event cannot be encoded.
    /// No envelopes are returned in that case.
    pub fn capture(
        &self,
        sources: &mut [&mut dyn EventSource],
    ) -> Result<Vec<OutboxEnvelope>, DomainError> {
        let events: Vec<_> = sources
            .iter_mut()
            .flat_map(|source| source.drain_events())
            .collect();
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let envelopes = events
            .iter()
            .map(|event| self.registry.encode(event.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = envelopes.len(), "captured domain events");
        Ok(envelopes)
    }
}
