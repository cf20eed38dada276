//! Domain events for the Membership context.

use std::any::Any;

use folio_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tag for [`UserRegistered`].
pub const USER_REGISTERED_EVENT_TYPE: &str = "membership.user_registered";
/// Event type tag for [`UserNameChanged`].
pub const USER_NAME_CHANGED_EVENT_TYPE: &str = "membership.user_name_changed";

/// Emitted when a new member registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    /// The user identifier.
    pub user_id: Uuid,
    /// Contact email address.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Emitted when a member's name changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNameChanged {
    /// The user identifier.
    pub user_id: Uuid,
    /// New given name.
    pub first_name: String,
    /// New family name.
    pub last_name: String,
}

/// Event payload variants for the Membership context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEventKind {
    /// A user has registered.
    UserRegistered(UserRegistered),
    /// A user's name has changed.
    UserNameChanged(UserNameChanged),
}

/// Domain event envelope for the Membership context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: UserEventKind,
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            UserEventKind::UserRegistered(_) => USER_REGISTERED_EVENT_TYPE,
            UserEventKind::UserNameChanged(_) => USER_NAME_CHANGED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
