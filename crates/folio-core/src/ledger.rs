//! Consumption ledger abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;

/// Proof that one handler has finished acting on one event.
///
/// Keyed by `(event_id, handler_name)`. Records are never updated or
/// deleted; their existence is the deduplication signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumptionRecord {
    /// The event that was handled.
    pub event_id: Uuid,
    /// Stable name of the handler that handled it.
    pub handler_name: String,
}

impl ConsumptionRecord {
    /// Creates a record for the given pair.
    #[must_use]
    pub fn new(event_id: Uuid, handler_name: impl Into<String>) -> Self {
        Self {
            event_id,
            handler_name: handler_name.into(),
        }
    }
}

/// Transaction-scoped access to the consumption ledger.
#[async_trait]
pub trait ConsumptionLedger: Send {
    /// Returns `true` if the pair has already been recorded.
    async fn consumption_exists(
        &mut self,
        event_id: Uuid,
        handler_name: &str,
    ) -> Result<bool, DomainError>;

    /// Record a completed pair. A duplicate key is an error.
    async fn insert_consumption(&mut self, record: &ConsumptionRecord) -> Result<(), DomainError>;
}
