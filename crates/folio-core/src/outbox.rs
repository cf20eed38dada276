//! Outbox records and repository abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Persisted representation of a domain event awaiting dispatch.
///
/// An envelope moves from unprocessed (`processed_at` is `None`) to processed
/// exactly once and is never deleted or reset.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEnvelope {
    /// Mirrors the event id.
    pub id: Uuid,
    /// Type tag used to resolve the concrete event on read-back.
    pub event_type: String,
    /// Tagged event payload.
    pub content: serde_json::Value,
    /// When the event was raised.
    pub occurred_at: DateTime<Utc>,
    /// When dispatch finished, successfully or not.
    pub processed_at: Option<DateTime<Utc>>,
    /// Text of the terminal error from the last publish attempt.
    pub error: Option<String>,
}

impl OutboxEnvelope {
    /// Returns `true` once the dispatcher has finished with this envelope.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Marks the envelope processed, recording the terminal error if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the envelope was already processed.
    pub fn complete(
        &mut self,
        processed_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Result<(), DomainError> {
        if self.is_processed() {
            return Err(DomainError::Validation(format!(
                "outbox envelope {} is already processed",
                self.id
            )));
        }
        self.processed_at = Some(processed_at);
        self.error = error;
        Ok(())
    }
}

/// Envelope set aside for manual inspection after dispatch gave up on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The envelope this entry refers to.
    pub envelope_id: Uuid,
    /// Type tag of the envelope.
    pub event_type: String,
    /// Terminal error text.
    pub error: String,
    /// When dispatch gave up.
    pub failed_at: DateTime<Utc>,
}

/// Transaction-scoped access to the outbox tables.
#[async_trait]
pub trait OutboxRepository: Send {
    /// Stage new envelopes for insertion.
    async fn insert_envelopes(&mut self, envelopes: &[OutboxEnvelope]) -> Result<(), DomainError>;

    /// Read up to `limit` unprocessed envelopes, oldest first by occurrence
    /// time (ties broken by id).
    async fn fetch_unprocessed(&mut self, limit: usize) -> Result<Vec<OutboxEnvelope>, DomainError>;

    /// Persist `processed_at` and `error` for the given envelopes.
    ///
    /// Only rows that are still unprocessed change, so a processed envelope
    /// keeps its first completion.
    async fn mark_processed(&mut self, envelopes: &[OutboxEnvelope]) -> Result<(), DomainError>;

    /// Record a dead-lettered envelope.
    async fn insert_dead_letter(&mut self, dead_letter: &DeadLetter) -> Result<(), DomainError>;
}
