//! Event handlers for the Membership context.

use async_trait::async_trait;
use folio_core::error::DomainError;
use folio_core::event::DomainEvent;
use folio_outbox::handler::EventHandler;
use folio_outbox::unit_of_work::UnitOfWork;
use tracing::debug;

use crate::domain::aggregates::WelcomeNotice;
use crate::domain::events::{UserEvent, UserEventKind};

/// Records a `WelcomeNotice` for each newly registered user.
#[derive(Debug, Clone, Copy, Default)]
pub struct WelcomeNewMember;

#[async_trait]
impl EventHandler<UserEvent> for WelcomeNewMember {
    fn name(&self) -> &'static str {
        "membership.welcome"
    }

    async fn handle(&self, event: &UserEvent, uow: &mut UnitOfWork) -> Result<(), DomainError> {
        let UserEventKind::UserRegistered(registered) = &event.kind else {
            return Err(DomainError::Validation(format!(
                "{} cannot handle {}",
                self.name(),
                event.event_type()
            )));
        };
        if uow
            .load::<WelcomeNotice>(registered.user_id)
            .await?
            .is_some()
        {
            debug!(user_id = %registered.user_id, "member already welcomed");
            return Ok(());
        }

        let mut notice = WelcomeNotice::for_registration(registered, event.metadata.occurred_at);
        uow.save(&mut notice).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_core::aggregate::AggregateRoot;
    use folio_outbox::capture::EventCapture;
    use folio_outbox::idempotent::{Delivery, IdempotentHandler};
    use folio_outbox::registry::EventTypeRegistry;
    use folio_outbox::unit_of_work::UnitOfWorkFactory;
    use folio_test_support::{FixedClock, InMemoryStore};
    use uuid::Uuid;

    use super::WelcomeNewMember;
    use crate::domain::aggregates::User;

    fn factory(store: &InMemoryStore) -> UnitOfWorkFactory {
        let mut registry = EventTypeRegistry::new();
        crate::register_event_types(&mut registry);
        UnitOfWorkFactory::new(
            Arc::new(store.clone()),
            Arc::new(EventCapture::new(Arc::new(registry))),
        )
    }

    #[tokio::test]
    async fn test_welcome_is_recorded_once_per_registration() {
        // Arrange
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let mut user = User::register(
            Uuid::new_v4(),
            "ada@example.com",
            "Ada",
            "Lovelace",
            Uuid::new_v4(),
            &clock,
        )
        .unwrap();
        let registered = user.take_uncommitted_events().remove(0);
        let handler = IdempotentHandler::new(WelcomeNewMember, factory(&store));

        // Act
        let first = handler.handle(&registered).await.unwrap();
        let second = handler.handle(&registered).await.unwrap();

        // Assert
        assert_eq!(first, Delivery::Handled);
        assert_eq!(second, Delivery::AlreadyHandled);
        let notice = store.aggregate("welcome_notice", user.id).unwrap();
        assert_eq!(notice.version, 1);
        assert_eq!(notice.state["greeting"], "Welcome to Folio, Ada!");
        assert_eq!(store.consumptions().len(), 1);
    }
}
