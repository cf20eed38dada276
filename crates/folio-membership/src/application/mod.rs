//! Application layer for the Membership context.

pub mod command_handlers;
pub mod event_handlers;
