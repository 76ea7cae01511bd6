//! Type definitions for ingest-watch
//!
//! Contains the task status/step enums and the progress snapshot value type
//! shared between the protocol layer and the subscription client.

mod task;

pub use task::*;
