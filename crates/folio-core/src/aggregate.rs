//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that raise domain events while they mutate.
///
/// Aggregate state is persisted as a snapshot; raised events are held on the
/// aggregate until the unit of work captures them into the outbox.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate raises.
    type Event: DomainEvent;

    /// Storage discriminator for this aggregate type.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns events raised since the aggregate was last saved.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drains and clears the uncommitted events in one step.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}

/// Object-safe view over an aggregate with pending events.
///
/// Lets the capture interceptor walk aggregates of different types that take
/// part in the same unit of work.
pub trait EventSource: Send {
    /// Returns the aggregate identifier.
    fn source_id(&self) -> Uuid;

    /// Drains pending events. A drained event is never returned again.
    fn drain_events(&mut self) -> Vec<Box<dyn DomainEvent>>;
}

impl<A> EventSource for A
where
    A: AggregateRoot,
{
    fn source_id(&self) -> Uuid {
        self.aggregate_id()
    }

    fn drain_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        self.take_uncommitted_events()
            .into_iter()
            .map(|event| Box::new(event) as Box<dyn DomainEvent>)
            .collect()
    }
}
