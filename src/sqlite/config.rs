use serde::{Deserialize, Serialize};

use super::backend::SqliteBackend;
use crate::error::SqlSessionError;
use crate::session::Session;

pub(crate) fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Options for opening a `SQLite` session.
///
/// Deserializable so applications can keep them in their config files:
/// ```rust
/// use sql_session::sqlite::SqliteOptions;
///
/// let opts: SqliteOptions = serde_json::from_str(r#"{"db_path": ":memory:"}"#).unwrap();
/// assert_eq!(opts.busy_timeout_ms, 5_000);
/// assert!(!opts.foreign_keys);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteOptions {
    /// File path, `:memory:`, or a `file:` URI.
    pub db_path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub foreign_keys: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout_ms: default_busy_timeout_ms(),
            foreign_keys: false,
        }
    }

    #[must_use]
    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    #[must_use]
    pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.opts.busy_timeout_ms = busy_timeout_ms;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.opts.foreign_keys = foreign_keys;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open a [`Session`] with these options.
    ///
    /// # Errors
    ///
    /// Returns [`SqlSessionError::ConnectionError`] if the database cannot be opened.
    pub async fn build(self) -> Result<Session, SqlSessionError> {
        let backend = SqliteBackend::open(self.finish()).await?;
        Session::new(Box::new(backend))
    }
}

impl Session {
    #[must_use]
    pub fn sqlite_builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}
