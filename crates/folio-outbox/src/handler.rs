//! Typed event handler trait.

use async_trait::async_trait;
use folio_core::error::DomainError;
use folio_core::event::DomainEvent;

use crate::unit_of_work::UnitOfWork;

/// Reacts to one concrete event type.
///
/// Handlers receive the unit of work their side effects belong to; the
/// consumption record for the (event, handler) pair commits in the same
/// transaction. `name` must be stable across deployments because it keys
/// the consumption ledger.
#[async_trait]
pub trait EventHandler<E>: Send + Sync
where
    E: DomainEvent,
{
    /// Stable handler name, unique within the process.
    fn name(&self) -> &'static str;

    /// Performs the side effects for `event` through `uow`.
    async fn handle(&self, event: &E, uow: &mut UnitOfWork) -> Result<(), DomainError>;
}
