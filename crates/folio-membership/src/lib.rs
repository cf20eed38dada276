//! Folio: Membership bounded context.
//!
//! Responsible for member registration and profile names, and for
//! welcoming new members once their registration has been published.

pub mod application;
pub mod domain;

use folio_outbox::bus::EventBus;
use folio_outbox::registry::EventTypeRegistry;

use crate::application::event_handlers::WelcomeNewMember;
use crate::domain::events::{USER_NAME_CHANGED_EVENT_TYPE, USER_REGISTERED_EVENT_TYPE, UserEvent};

/// Registers every Membership event tag with the outbox codec.
pub fn register_event_types(registry: &mut EventTypeRegistry) {
    registry
        .register::<UserEvent>(USER_REGISTERED_EVENT_TYPE)
        .register::<UserEvent>(USER_NAME_CHANGED_EVENT_TYPE);
}

/// Subscribes the Membership event handlers to `bus`.
pub fn subscribe_handlers(bus: &mut EventBus) {
    bus.subscribe::<UserEvent, _>(USER_REGISTERED_EVENT_TYPE, WelcomeNewMember);
}
