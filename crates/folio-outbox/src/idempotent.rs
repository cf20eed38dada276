//! Idempotent consumer wrapper.

use std::marker::PhantomData;

use async_trait::async_trait;
use folio_core::error::DomainError;
use folio_core::event::DomainEvent;
use folio_core::ledger::ConsumptionRecord;
use tracing::{debug, instrument, warn};

use crate::handler::EventHandler;
use crate::unit_of_work::UnitOfWorkFactory;

/// What happened when an event reached a wrapped handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The handler ran and its consumption record was committed.
    Handled,
    /// A consumption record already existed; the handler was skipped.
    AlreadyHandled,
}

/// Runs a handler at most once per event.
///
/// Each delivery opens its own unit of work, checks the consumption ledger,
/// runs the handler, and commits the handler's writes together with the
/// consumption record. A failing handler leaves neither behind.
pub struct IdempotentHandler<E, H> {
    inner: H,
    factory: UnitOfWorkFactory,
    _event: PhantomData<fn(&E)>,
}

impl<E, H> IdempotentHandler<E, H>
where
    E: DomainEvent,
    H: EventHandler<E>,
{
    /// Wraps `inner`; deliveries open units of work from `factory`.
    #[must_use]
    pub fn new(inner: H, factory: UnitOfWorkFactory) -> Self {
        Self {
            inner,
            factory,
            _event: PhantomData,
        }
    }

    /// The wrapped handler's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Delivers `event` to the wrapped handler unless it already consumed it.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, or the store's error if the ledger check,
    /// consumption insert or commit fails. Nothing is persisted on error.
    #[instrument(
        skip_all,
        fields(handler = self.inner.name(), event_id = %event.metadata().event_id)
    )]
    pub async fn handle(&self, event: &E) -> Result<Delivery, DomainError> {
        let handler_name = self.inner.name();
        let event_id = event.metadata().event_id;
        let mut uow = self.factory.begin().await?;

        if uow.has_consumed(event_id, handler_name).await? {
            if let Err(error) = uow.rollback().await {
                warn!(error = %error, "rollback after skipped delivery failed");
            }
            debug!("event already consumed, skipping");
            return Ok(Delivery::AlreadyHandled);
        }

        if let Err(error) = self.inner.handle(event, &mut uow).await {
            if let Err(rollback_error) = uow.rollback().await {
                warn!(error = %rollback_error, "rollback after handler failure failed");
            }
            return Err(error);
        }

        uow.record_consumption(&ConsumptionRecord::new(event_id, handler_name))
            .await?;
        uow.commit().await?;
        debug!("event handled");
        Ok(Delivery::Handled)
    }
}

/// Type-erased view used by the bus to hold handlers of many event types.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Delivers `event` if it is the wrapped handler's event type.
    async fn deliver(&self, event: &dyn DomainEvent) -> Result<Delivery, DomainError>;
}

#[async_trait]
impl<E, H> ErasedHandler for IdempotentHandler<E, H>
where
    E: DomainEvent,
    H: EventHandler<E>,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn deliver(&self, event: &dyn DomainEvent) -> Result<Delivery, DomainError> {
        let Some(typed) = event.as_any().downcast_ref::<E>() else {
            return Err(DomainError::Validation(format!(
                "handler {} cannot accept event type {}",
                self.inner.name(),
                event.event_type()
            )));
        };
        self.handle(typed).await
    }
}
