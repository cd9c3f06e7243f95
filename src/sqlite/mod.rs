// SQLite connector - a Backend over rusqlite
//
// - config: connection options and builder
// - connector: registry entry producing backends from a database path
// - backend: the Backend implementation and its buffered cursors
// - worker: dedicated thread owning the rusqlite connection
// - params / query: value conversion and statement execution

pub mod config;
pub mod connector;
pub mod params;

mod backend;
mod query;
mod worker;

pub use backend::SqliteBackend;
pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connector::SqliteConnector;
pub use params::{row_value_to_sqlite_value, sqlite_value_to_row_value};
