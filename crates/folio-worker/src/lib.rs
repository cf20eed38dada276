//! Folio worker: wiring for the outbox background process.
//!
//! The binary in `main.rs` reads [`config::WorkerConfig`], connects to
//! `PostgreSQL`, builds a [`state::WorkerState`] and runs the outbox
//! scheduler until shutdown.

pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
