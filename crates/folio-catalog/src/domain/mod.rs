//! Domain layer for the Catalog context.

pub mod aggregates;
pub mod commands;
pub mod events;
