//! Folio Store: `PostgreSQL` persistence.
//!
//! Aggregate snapshots, outbox envelopes, dead letters and consumption
//! records live in one database so each unit of work commits atomically.

pub mod pg_store;
