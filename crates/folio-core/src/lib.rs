//! Folio Core: shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the bounded
//! contexts and the outbox depend on. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod ledger;
pub mod outbox;
pub mod repository;
pub mod store;
