//! Domain layer for the Membership context.

pub mod aggregates;
pub mod commands;
pub mod events;
