//! Statement binding and chunked extraction over pluggable database backends.
//!
//! A [`Session`] owns one backend connection. Statements are composed from SQL
//! text and *bindings*: [`use_value`]/[`use_all`] feed host values into
//! placeholders, [`into_value`]/[`into_all`] receive result columns. A
//! [`Limit`] makes [`Statement::execute`] fetch rows in bounded chunks.
//!
//! ```rust,no_run
//! use sql_session::prelude::*;
//! use std::collections::BTreeSet;
//!
//! # async fn run() -> Result<(), SqlSessionError> {
//! SqliteConnector::register();
//! let session = Session::connect("sqlite", ":memory:").await?;
//!
//! let ids = vec![1_i64, 2, 3];
//! session
//!     .compose("CREATE TABLE dummy (id INTEGER)")
//!     .execute_now()
//!     .await?;
//! session
//!     .compose("INSERT INTO dummy (id) VALUES (?)")
//!     .bind(use_all(&ids))
//!     .execute_now()
//!     .await?;
//!
//! let mut seen: BTreeSet<i64> = BTreeSet::new();
//! let mut stmt = session
//!     .compose("SELECT id FROM dummy")
//!     .bind(into_all(&mut seen))
//!     .limit(Limit::new(2))
//!     .build()?;
//! while !stmt.is_done() {
//!     stmt.execute().await?;
//! }
//! drop(stmt);
//! assert_eq!(seen.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod backend;
pub mod binding;
pub mod capabilities;
pub mod connector;
pub mod error;
pub mod placeholders;
pub mod results;
pub mod session;
pub mod statement;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::{Backend, Fetched, PreparedId};
pub use binding::{Binding, Direction, into_all, into_shared, into_value, use_all, use_value};
pub use capabilities::Capabilities;
pub use connector::{Connector, SessionFactory};
pub use error::SqlSessionError;
pub use results::{CustomDbRow, ResultSet};
pub use session::Session;
pub use statement::{Limit, Statement, StatementCreator, StatementState};
pub use types::RowValues;
