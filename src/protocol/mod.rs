//! Protocol module for the task-progress subscription
//!
//! Defines the JSON messages exchanged with the ingestion backend over the
//! per-task WebSocket endpoint.

mod messages;

pub use messages::*;
