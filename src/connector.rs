use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use async_trait::async_trait;

use crate::backend::Backend;
use crate::error::SqlSessionError;
use crate::session::Session;

/// Produces connected [`Backend`]s for one database engine.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Registry key, e.g. `"sqlite"`.
    fn name(&self) -> &str;

    /// Open a connection. The connection string format is connector-defined.
    ///
    /// # Errors
    /// [`SqlSessionError::ConnectionError`] when the connection string is rejected.
    async fn connect(&self, connection_string: &str)
    -> Result<Box<dyn Backend>, SqlSessionError>;
}

static FACTORY: LazyLock<SessionFactory> = LazyLock::new(SessionFactory::new);

/// Registry of connectors keyed by name.
///
/// [`SessionFactory::instance`] is the process-wide registry used by
/// [`Session::connect`]; standalone factories are useful in tests.
#[derive(Default)]
pub struct SessionFactory {
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
}

impl SessionFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide factory.
    #[must_use]
    pub fn instance() -> &'static SessionFactory {
        &FACTORY
    }

    /// Register `connector` under its name, returning the connector it replaced.
    pub fn add(&self, connector: Arc<dyn Connector>) -> Option<Arc<dyn Connector>> {
        let key = connector.name().to_string();
        tracing::debug!(connector = %key, "registering connector");
        self.write().insert(key, connector)
    }

    /// Remove a connector. Returns `false` when nothing was registered under `key`.
    pub fn remove(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Registered connector keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Open a session through the connector registered under `key`.
    ///
    /// # Errors
    /// [`SqlSessionError::ConnectorNotFound`] for unknown keys, otherwise whatever
    /// the connector reports (typically [`SqlSessionError::ConnectionError`]).
    pub async fn create(
        &self,
        key: &str,
        connection_string: &str,
    ) -> Result<Session, SqlSessionError> {
        let connector = self
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SqlSessionError::ConnectorNotFound(key.to_string()))?;
        let backend = connector.connect(connection_string).await?;
        Session::new(backend)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn Connector>>> {
        // The map stays consistent even if a writer panicked.
        self.connectors
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn Connector>>> {
        self.connectors
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedConnector;

    #[tokio::test]
    async fn unknown_key_is_reported() {
        let factory = SessionFactory::new();
        let err = factory.create("nope", "").await.unwrap_err();
        assert!(matches!(err, SqlSessionError::ConnectorNotFound(key) if key == "nope"));
    }

    #[tokio::test]
    async fn add_replaces_and_remove_forgets() {
        let factory = SessionFactory::new();
        assert!(factory.add(Arc::new(ScriptedConnector::new("mock"))).is_none());
        assert!(factory.add(Arc::new(ScriptedConnector::new("mock"))).is_some());
        assert_eq!(factory.keys(), vec!["mock".to_string()]);

        let session = factory.create("mock", "db").await.expect("session");
        assert_eq!(session.connector(), "mock");

        assert!(factory.remove("mock"));
        assert!(!factory.remove("mock"));
        assert!(!factory.contains("mock"));
    }
}
