//! Aggregate repository abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;

/// Stored snapshot of an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    /// Aggregate identifier.
    pub aggregate_id: Uuid,
    /// Aggregate type discriminator.
    pub aggregate_type: String,
    /// Number of times the aggregate has been saved.
    pub version: i64,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
}

/// Transaction-scoped access to aggregate snapshots.
#[async_trait]
pub trait AggregateRepository: Send {
    /// Load the latest snapshot for an aggregate, if one exists.
    async fn load_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError>;

    /// Write a snapshot with optimistic concurrency.
    ///
    /// `expected_version` is the version the caller loaded (0 for a new
    /// aggregate); `record.version` must be `expected_version + 1`.
    async fn save_aggregate(
        &mut self,
        record: AggregateRecord,
        expected_version: i64,
    ) -> Result<(), DomainError>;
}
