//! Outbox error types.

use folio_core::error::DomainError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while dispatching the outbox.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The backing store failed or rejected a write.
    #[error(transparent)]
    Store(#[from] DomainError),

    /// An envelope's content could not be turned back into an event.
    #[error("cannot decode outbox envelope {envelope_id}: {reason}")]
    Decode {
        /// The unreadable envelope.
        envelope_id: Uuid,
        /// What went wrong.
        reason: String,
    },

    /// A handler failed while an event was being published.
    #[error("handler {handler} failed: {source}")]
    Handler {
        /// Name of the failing handler.
        handler: &'static str,
        /// The handler's error.
        source: DomainError,
    },
}
