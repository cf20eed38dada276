//! Folio Outbox: reliable event propagation.
//!
//! Events raised by aggregates are captured into the outbox in the same
//! transaction as the state change that raised them. A background dispatcher
//! later drains the outbox in bounded batches and publishes each event to
//! handlers that are wrapped so every (event, handler) pair takes effect at
//! most once.

pub mod bus;
pub mod capture;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod idempotent;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod unit_of_work;

#[cfg(test)]
mod testing;

/// Default number of envelopes read per dispatcher run.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default interval between dispatcher runs, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
