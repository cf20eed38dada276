//! Folio: Book Catalog bounded context.
//!
//! Responsible for the book lifecycle (add, update, view, soft delete)
//! and the catalog-wide summary kept up to date from book events.

pub mod application;
pub mod domain;

use folio_outbox::bus::EventBus;
use folio_outbox::registry::EventTypeRegistry;

use crate::application::event_handlers::{
    SummaryOnBookCreated, SummaryOnBookDeleted, SummaryOnBookViewed,
};
use crate::domain::events::{
    BOOK_CREATED_EVENT_TYPE, BOOK_DELETED_EVENT_TYPE, BOOK_UPDATED_EVENT_TYPE,
    BOOK_VIEWED_EVENT_TYPE, CatalogEvent,
};

/// Registers every Catalog event tag with the outbox codec.
pub fn register_event_types(registry: &mut EventTypeRegistry) {
    registry
        .register::<CatalogEvent>(BOOK_CREATED_EVENT_TYPE)
        .register::<CatalogEvent>(BOOK_UPDATED_EVENT_TYPE)
        .register::<CatalogEvent>(BOOK_VIEWED_EVENT_TYPE)
        .register::<CatalogEvent>(BOOK_DELETED_EVENT_TYPE);
}

/// Subscribes the Catalog event handlers to `bus`.
pub fn subscribe_handlers(bus: &mut EventBus) {
    bus.subscribe::<CatalogEvent, _>(BOOK_CREATED_EVENT_TYPE, SummaryOnBookCreated)
        .subscribe::<CatalogEvent, _>(BOOK_VIEWED_EVENT_TYPE, SummaryOnBookViewed)
        .subscribe::<CatalogEvent, _>(BOOK_DELETED_EVENT_TYPE, SummaryOnBookDeleted);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_outbox::bus::EventBus;
    use folio_outbox::capture::EventCapture;
    use folio_outbox::registry::EventTypeRegistry;
    use folio_outbox::unit_of_work::UnitOfWorkFactory;
    use folio_test_support::InMemoryStore;

    use crate::domain::events::{
        BOOK_CREATED_EVENT_TYPE, BOOK_DELETED_EVENT_TYPE, BOOK_UPDATED_EVENT_TYPE,
        BOOK_VIEWED_EVENT_TYPE,
    };

    #[test]
    fn test_every_catalog_tag_is_registered() {
        let mut registry = EventTypeRegistry::new();

        super::register_event_types(&mut registry);

        for tag in [
            BOOK_CREATED_EVENT_TYPE,
            BOOK_UPDATED_EVENT_TYPE,
            BOOK_VIEWED_EVENT_TYPE,
            BOOK_DELETED_EVENT_TYPE,
        ] {
            assert!(registry.is_registered(tag), "{tag} not registered");
        }
    }

    #[test]
    fn test_updates_have_no_subscribers() {
        let registry = Arc::new(EventTypeRegistry::new());
        let factory = UnitOfWorkFactory::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(EventCapture::new(registry)),
        );
        let mut bus = EventBus::new(factory);

        super::subscribe_handlers(&mut bus);

        assert_eq!(
            bus.handler_names(BOOK_CREATED_EVENT_TYPE),
            vec!["catalog.summary.on_book_created"]
        );
        assert!(bus.handler_names(BOOK_UPDATED_EVENT_TYPE).is_empty());
    }
}
