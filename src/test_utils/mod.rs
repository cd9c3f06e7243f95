//! In-memory backend and connector for exercising the session layer without a
//! database.

mod scripted;
mod test_helpers;

pub use scripted::{BackendCall, ScriptHandle, ScriptedBackend, ScriptedConnector};
pub use test_helpers::{create_test_row, numbered_rows};
