use std::sync::Arc;

use async_trait::async_trait;

use super::backend::SqliteBackend;
use super::config::SqliteOptions;
use crate::backend::Backend;
use crate::connector::{Connector, SessionFactory};
use crate::error::SqlSessionError;

/// Connector for `SQLite`; the connection string is the database path.
///
/// Busy timeout and foreign-key enforcement come from the template options
/// given to [`SqliteConnector::with_options`].
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    template: SqliteOptions,
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self {
            template: SqliteOptions::new(String::new()),
        }
    }
}

impl SqliteConnector {
    pub const NAME: &'static str = "sqlite";

    /// Use `template` for every connection; its `db_path` is ignored.
    #[must_use]
    pub fn with_options(template: SqliteOptions) -> Self {
        Self { template }
    }

    /// Register a default `SQLite` connector with the process-wide factory.
    pub fn register() {
        SessionFactory::instance().add(Arc::new(Self::default()));
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn connect(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn Backend>, SqlSessionError> {
        if connection_string.is_empty() {
            return Err(SqlSessionError::ConnectionError(
                "SQLite connection string must name a database".into(),
            ));
        }
        let options = SqliteOptions {
            db_path: connection_string.to_string(),
            ..self.template.clone()
        };
        Ok(Box::new(SqliteBackend::open(options).await?))
    }
}
