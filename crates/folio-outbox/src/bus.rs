//! In-process event bus.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use folio_core::event::DomainEvent;
use tracing::debug;

use crate::error::OutboxError;
use crate::handler::EventHandler;
use crate::idempotent::{ErasedHandler, IdempotentHandler};
use crate::unit_of_work::UnitOfWorkFactory;

/// Routes decoded events to every handler subscribed to their type.
///
/// All subscribed handlers are wrapped in [`IdempotentHandler`], so
/// publishing the same event again only reaches handlers that have not
/// consumed it yet.
#[derive(Clone)]
pub struct EventBus {
    factory: UnitOfWorkFactory,
    handlers: HashMap<&'static str, Vec<Arc<dyn ErasedHandler>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions: HashMap<&str, Vec<&str>> = self
            .handlers
            .iter()
            .map(|(tag, handlers)| (*tag, handlers.iter().map(|h| h.name()).collect()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscriptions", &subscriptions)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Creates a bus with no subscriptions. Handlers run in units of work
    /// opened from `factory`.
    #[must_use]
    pub fn new(factory: UnitOfWorkFactory) -> Self {
        Self {
            factory,
            handlers: HashMap::new(),
        }
    }

    /// Subscribes `handler` to events tagged `event_type`.
    ///
    /// Handlers for the same tag run in subscription order.
    pub fn subscribe<E, H>(&mut self, event_type: &'static str, handler: H) -> &mut Self
    where
        E: DomainEvent,
        H: EventHandler<E> + 'static,
    {
        let wrapped = IdempotentHandler::new(handler, self.factory.clone());
        self.handlers
            .entry(event_type)
            .or_default()
            .push(Arc::new(wrapped));
        self
    }

    /// Names of the handlers subscribed to `event_type`, in run order.
    #[must_use]
    pub fn handler_names(&self, event_type: &str) -> Vec<&'static str> {
        self.handlers
            .get(event_type)
            .map(|handlers| handlers.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }

    /// Delivers `event` to each subscribed handler in turn.
    ///
    /// Stops at the first failing handler. Handlers that already succeeded
    /// keep their consumption records, so a retry of the same event only
    /// re-runs the handlers that have not finished.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Handler` naming the first handler that failed.
    pub async fn publish(&self, event: &dyn DomainEvent) -> Result<(), OutboxError> {
        let Some(handlers) = self.handlers.get(event.event_type()) else {
            debug!(event_type = event.event_type(), "no handlers subscribed");
            return Ok(());
        };
        for handler in handlers {
            handler
                .deliver(event)
                .await
                .map_err(|source| OutboxError::Handler {
                    handler: handler.name(),
                    source,
                })?;
        }
        Ok(())
    }
}
