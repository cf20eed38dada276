//! Aggregate roots for the Membership context.

use chrono::{DateTime, Utc};
use folio_core::aggregate::AggregateRoot;
use folio_core::clock::Clock;
use folio_core::error::DomainError;
use folio_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    USER_NAME_CHANGED_EVENT_TYPE, USER_REGISTERED_EVENT_TYPE, UserEvent, UserEventKind,
    UserNameChanged, UserRegistered,
};

/// Longest accepted first or last name, in characters.
pub const NAME_MAX_LENGTH: usize = 50;

fn validate_name(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > NAME_MAX_LENGTH {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "'{email}' is not a valid email address"
        )))
    }
}

/// The aggregate root for a registered member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Contact email address.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    #[serde(skip)]
    uncommitted_events: Vec<UserEvent>,
}

impl User {
    /// Registers a new user, producing a `UserRegistered` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the email is malformed or either
    /// name is blank or too long.
    pub fn register(
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        validate_email(email)?;
        validate_name("first name", first_name)?;
        validate_name("last name", last_name)?;

        let mut user = Self {
            id,
            email: email.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            uncommitted_events: Vec::new(),
        };
        user.raise(
            USER_REGISTERED_EVENT_TYPE,
            UserEventKind::UserRegistered(UserRegistered {
                user_id: id,
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            }),
            correlation_id,
            clock,
        );
        Ok(user)
    }

    /// Changes the user's name. Raises `UserNameChanged` only when the name
    /// actually differs.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if either name is blank or too long.
    pub fn change_name(
        &mut self,
        first_name: &str,
        last_name: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        validate_name("first name", first_name)?;
        validate_name("last name", last_name)?;
        if self.first_name == first_name && self.last_name == last_name {
            return Ok(());
        }

        first_name.clone_into(&mut self.first_name);
        last_name.clone_into(&mut self.last_name);
        self.raise(
            USER_NAME_CHANGED_EVENT_TYPE,
            UserEventKind::UserNameChanged(UserNameChanged {
                user_id: self.id,
                first_name: first_name.to_owned(),
                last_name: last_name.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    fn raise(
        &mut self,
        event_type: &str,
        kind: UserEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        self.uncommitted_events.push(UserEvent {
            metadata: EventMetadata::raise(event_type, self.id, correlation_id, clock),
            kind,
        });
    }
}

impl AggregateRoot for User {
    type Event = UserEvent;

    const AGGREGATE_TYPE: &'static str = "user";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

/// Record that a new member has been welcomed. Keyed by the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeNotice {
    /// Aggregate identifier, the welcomed user's id.
    pub id: Uuid,
    /// Where the welcome was addressed.
    pub email: String,
    /// Greeting line.
    pub greeting: String,
    /// When the registration that triggered the welcome happened.
    pub registered_at: DateTime<Utc>,
    #[serde(skip)]
    uncommitted_events: Vec<UserEvent>,
}

impl WelcomeNotice {
    /// Builds the welcome for a freshly registered user.
    #[must_use]
    pub fn for_registration(registered: &UserRegistered, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: registered.user_id,
            email: registered.email.clone(),
            greeting: format!("Welcome to Folio, {}!", registered.first_name),
            registered_at,
            uncommitted_events: Vec::new(),
        }
    }
}

impl AggregateRoot for WelcomeNotice {
    type Event = UserEvent;

    const AGGREGATE_TYPE: &'static str = "welcome_notice";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::event::DomainEvent;
    use folio_test_support::FixedClock;

    fn ada(clock: &dyn Clock) -> User {
        User::register(
            Uuid::new_v4(),
            "ada@example.com",
            "Ada",
            "Lovelace",
            Uuid::new_v4(),
            clock,
        )
        .unwrap()
    }

    #[test]
    fn test_register_raises_user_registered() {
        // Arrange
        let clock = FixedClock::default();

        // Act
        let user = ada(&clock);

        // Assert
        let events = user.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), USER_REGISTERED_EVENT_TYPE);
        assert_eq!(events[0].metadata.aggregate_id, user.id);
        assert!(matches!(
            &events[0].kind,
            UserEventKind::UserRegistered(registered) if registered.email == "ada@example.com"
        ));
    }

    #[test]
    fn test_register_rejects_malformed_email() {
        let clock = FixedClock::default();

        for email in ["", "ada", "@example.com", "ada@", "a@b@c", "ada @example.com"] {
            let result = User::register(Uuid::new_v4(), email, "Ada", "Lovelace", Uuid::new_v4(), &clock);
            assert!(matches!(result, Err(DomainError::Validation(_))), "{email:?}");
        }
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let clock = FixedClock::default();
        let long_name = "n".repeat(NAME_MAX_LENGTH + 1);

        let blank = User::register(Uuid::new_v4(), "ada@example.com", " ", "Lovelace", Uuid::new_v4(), &clock);
        let long = User::register(Uuid::new_v4(), "ada@example.com", "Ada", &long_name, Uuid::new_v4(), &clock);

        assert!(matches!(blank, Err(DomainError::Validation(_))));
        assert!(matches!(long, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_change_name_raises_only_on_difference() {
        let clock = FixedClock::default();
        let mut user = ada(&clock);
        user.take_uncommitted_events();

        user.change_name("Ada", "Lovelace", Uuid::new_v4(), &clock).unwrap();
        let unchanged = user.take_uncommitted_events();
        user.change_name("Ada", "King", Uuid::new_v4(), &clock).unwrap();
        let changed = user.take_uncommitted_events();

        assert!(unchanged.is_empty());
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].event_type(), USER_NAME_CHANGED_EVENT_TYPE);
        assert_eq!(user.last_name, "King");
    }

    #[test]
    fn test_welcome_notice_greets_by_first_name() {
        let clock = FixedClock::default();
        let registered = UserRegistered {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
        };

        let notice = WelcomeNotice::for_registration(&registered, clock.now());

        assert_eq!(notice.id, registered.user_id);
        assert_eq!(notice.greeting, "Welcome to Folio, Ada!");
        assert_eq!(notice.registered_at, clock.now());
    }
}
