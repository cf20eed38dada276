//! Shared worker state: the outbox pipeline wired for every bounded context.

use std::sync::Arc;

use folio_core::clock::Clock;
use folio_core::store::TransactionalStore;
use folio_outbox::bus::EventBus;
use folio_outbox::capture::EventCapture;
use folio_outbox::dispatcher::{DispatcherConfig, OutboxDispatcher};
use folio_outbox::registry::EventTypeRegistry;
use folio_outbox::scheduler::OutboxScheduler;
use folio_outbox::unit_of_work::UnitOfWorkFactory;

/// The assembled outbox pipeline.
#[derive(Debug, Clone)]
pub struct WorkerState {
    /// Opens units of work whose saves are captured into the outbox.
    pub uow_factory: UnitOfWorkFactory,
    /// Drains the outbox into the event bus.
    pub dispatcher: Arc<OutboxDispatcher>,
}

impl WorkerState {
    /// Registers every context's event types, subscribes every context's
    /// handlers and builds the dispatcher over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> Self {
        let mut registry = EventTypeRegistry::new();
        folio_catalog::register_event_types(&mut registry);
        folio_membership::register_event_types(&mut registry);
        let registry = Arc::new(registry);

        let capture = Arc::new(EventCapture::new(Arc::clone(&registry)));
        let uow_factory = UnitOfWorkFactory::new(Arc::clone(&store), capture);

        let mut bus = EventBus::new(uow_factory.clone());
        folio_catalog::subscribe_handlers(&mut bus);
        folio_membership::subscribe_handlers(&mut bus);

        let dispatcher = OutboxDispatcher::new(store, registry, Arc::new(bus), clock, config);
        Self {
            uow_factory,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// A scheduler for the dispatcher at its configured poll interval.
    #[must_use]
    pub fn scheduler(&self) -> OutboxScheduler {
        OutboxScheduler::new(Arc::clone(&self.dispatcher))
    }
}
