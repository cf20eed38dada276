//! Commands for the Membership context.

use folio_core::command::Command;
use uuid::Uuid;

/// Command to register a new member.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The identifier for the new user.
    pub user_id: Uuid,
    /// Contact email address.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Command to change a member's name.
#[derive(Debug, Clone)]
pub struct ChangeUserName {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user identifier.
    pub user_id: Uuid,
    /// New given name.
    pub first_name: String,
    /// New family name.
    pub last_name: String,
}

impl Command for RegisterUser {
    fn command_type(&self) -> &'static str {
        "membership.register_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for ChangeUserName {
    fn command_type(&self) -> &'static str {
        "membership.change_user_name"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
