//! Transactional store abstraction.
//!
//! Business snapshots, outbox envelopes and ledger records all live in one
//! store so that each group of writes commits or rolls back as a unit.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::ledger::ConsumptionLedger;
use crate::outbox::OutboxRepository;
use crate::repository::AggregateRepository;

/// An open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait Transaction: AggregateRepository + OutboxRepository + ConsumptionLedger {
    /// Make all writes in this transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discard all writes in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// Entry point to the backing store.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError>;
}
