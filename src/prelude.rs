//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::backend::{Backend, Fetched, PreparedId};
pub use crate::binding::{
    Binding, Direction, IntoCollection, KeyExtract, PlaceholderRef, TypeBinding, into_all,
    into_shared, into_value, use_all, use_value,
};
pub use crate::capabilities::Capabilities;
pub use crate::connector::{Connector, SessionFactory};
pub use crate::error::SqlSessionError;
pub use crate::placeholders::PlaceholderMap;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::session::Session;
pub use crate::statement::{Fragment, Limit, Statement, StatementCreator, StatementState};
pub use crate::types::RowValues;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnector, SqliteOptions, SqliteOptionsBuilder};
