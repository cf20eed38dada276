//! Shared test doubles and utilities for the Folio book service.

mod clock;
mod store;

pub use clock::FixedClock;
pub use store::{FailingStore, InMemoryStore};
