//! Application layer for the Catalog context.

pub mod command_handlers;
pub mod event_handlers;
