use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::connector::SessionFactory;
use crate::error::SqlSessionError;
use crate::statement::StatementCreator;
use crate::types::RowValues;

/// Backend connection shared by session copies and the statements they create.
pub(crate) type SharedBackend = Arc<tokio::sync::Mutex<Box<dyn Backend>>>;

/// A handle to one database connection.
///
/// Cloning a session shares the connection. Each copy can be closed on its
/// own; the connection itself is closed when the last copy (or statement)
/// referencing it goes away.
///
/// Copies are safe to move across tasks, but calls are serialised on the
/// connection: two tasks using copies of one session see no ordering
/// guarantee between their statements.
///
/// ```rust,no_run
/// use sql_session::prelude::*;
///
/// # async fn run() -> Result<(), SqlSessionError> {
/// SqliteConnector::register();
/// let mut session = Session::connect("sqlite", ":memory:").await?;
///
/// session.begin().await?;
/// session
///     .compose("CREATE TABLE t (id INTEGER)")
///     .execute_now()
///     .await?;
/// session.commit().await?;
///
/// let mut count = 0_i64;
/// session
///     .compose("SELECT count(*) FROM t")
///     .bind(into_value(&mut count))
///     .execute_now()
///     .await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    backend: Option<SharedBackend>,
    connector: String,
}

impl Session {
    /// Wrap an already-connected backend.
    ///
    /// # Errors
    /// [`SqlSessionError::ConnectionError`] if the backend reports it is not connected.
    pub fn new(backend: Box<dyn Backend>) -> Result<Self, SqlSessionError> {
        if !backend.is_connected() {
            return Err(SqlSessionError::ConnectionError(format!(
                "{} backend is not connected",
                backend.connector_name()
            )));
        }
        let connector = backend.connector_name().to_string();
        debug!(connector = %connector, "session opened");
        Ok(Self {
            backend: Some(Arc::new(tokio::sync::Mutex::new(backend))),
            connector,
        })
    }

    /// Open a session through the process-wide [`SessionFactory`].
    ///
    /// # Errors
    /// [`SqlSessionError::ConnectorNotFound`] for unregistered keys,
    /// [`SqlSessionError::ConnectionError`] when the connector rejects
    /// `connection_string`.
    pub async fn connect(key: &str, connection_string: &str) -> Result<Self, SqlSessionError> {
        SessionFactory::instance()
            .create(key, connection_string)
            .await
    }

    /// Key of the connector that produced this session's backend.
    #[must_use]
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Start building a statement from `sql`.
    ///
    /// A closed session still hands out a creator; building it fails with
    /// [`SqlSessionError::SessionClosed`].
    #[must_use]
    pub fn compose<'a>(&self, sql: &str) -> StatementCreator<'a> {
        StatementCreator::new(self.backend.clone(), sql)
    }

    /// # Errors
    /// [`SqlSessionError::TransactionState`] when a transaction is already active.
    pub async fn begin(&self) -> Result<(), SqlSessionError> {
        let backend = self.shared()?;
        let mut backend = backend.lock().await;
        if backend.is_transaction() {
            return Err(SqlSessionError::TransactionState(
                "begin called while a transaction is active".into(),
            ));
        }
        backend.begin().await?;
        debug!(connector = %self.connector, "transaction started");
        Ok(())
    }

    /// # Errors
    /// [`SqlSessionError::TransactionState`] when no transaction is active.
    pub async fn commit(&self) -> Result<(), SqlSessionError> {
        let backend = self.shared()?;
        let mut backend = backend.lock().await;
        if !backend.is_transaction() {
            return Err(SqlSessionError::TransactionState(
                "commit called without an active transaction".into(),
            ));
        }
        backend.commit().await?;
        debug!(connector = %self.connector, "transaction committed");
        Ok(())
    }

    /// # Errors
    /// [`SqlSessionError::TransactionState`] when no transaction is active.
    pub async fn rollback(&self) -> Result<(), SqlSessionError> {
        let backend = self.shared()?;
        let mut backend = backend.lock().await;
        if !backend.is_transaction() {
            return Err(SqlSessionError::TransactionState(
                "rollback called without an active transaction".into(),
            ));
        }
        backend.rollback().await?;
        debug!(connector = %self.connector, "transaction rolled back");
        Ok(())
    }

    /// Release this copy of the session.
    ///
    /// The backend connection is closed here if no other session copy or
    /// statement still uses it.
    ///
    /// # Errors
    /// [`SqlSessionError::SessionClosed`] if this copy was already closed, or
    /// the backend's close failure.
    pub async fn close(&mut self) -> Result<(), SqlSessionError> {
        let backend = self.backend.take().ok_or(SqlSessionError::SessionClosed)?;
        match Arc::into_inner(backend) {
            Some(last) => {
                last.into_inner().close().await?;
                debug!(connector = %self.connector, "connection closed");
            }
            None => debug!(connector = %self.connector, "session copy released"),
        }
        Ok(())
    }

    /// False once this copy is closed or the backend lost its connection.
    pub async fn is_connected(&self) -> bool {
        match &self.backend {
            Some(backend) => backend.lock().await.is_connected(),
            None => false,
        }
    }

    /// # Errors
    /// [`SqlSessionError::SessionClosed`] on a closed copy.
    pub async fn is_transaction(&self) -> Result<bool, SqlSessionError> {
        Ok(self.shared()?.lock().await.is_transaction())
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for names the backend does not know.
    pub async fn set_feature(&self, name: &str, state: bool) -> Result<(), SqlSessionError> {
        self.shared()?.lock().await.set_feature(name, state).await
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for names the backend does not know.
    pub async fn get_feature(&self, name: &str) -> Result<bool, SqlSessionError> {
        self.shared()?.lock().await.get_feature(name).await
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for names the backend does not know.
    pub async fn set_property(&self, name: &str, value: RowValues) -> Result<(), SqlSessionError> {
        self.shared()?.lock().await.set_property(name, value).await
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for names the backend does not know.
    pub async fn get_property(&self, name: &str) -> Result<RowValues, SqlSessionError> {
        self.shared()?.lock().await.get_property(name).await
    }

    fn shared(&self) -> Result<&SharedBackend, SqlSessionError> {
        self.backend.as_ref().ok_or(SqlSessionError::SessionClosed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connector", &self.connector)
            .field("closed", &self.backend.is_none())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.take() {
            release_shared(backend);
        }
    }
}

/// Drop one reference to a shared backend, closing it when it was the last.
///
/// Inside a tokio runtime the close runs on a spawned task; without one the
/// backend is dropped in place and its own `Drop` releases native resources.
pub(crate) fn release_shared(backend: SharedBackend) {
    let Some(last) = Arc::into_inner(backend) else {
        return;
    };
    let mut backend = last.into_inner();
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            let name = backend.connector_name().to_string();
            if let Err(err) = backend.close().await {
                warn!(connector = %name, error = %err, "closing dropped session failed");
            } else {
                debug!(connector = %name, "connection closed on drop");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedBackend;

    #[tokio::test]
    async fn disconnected_backend_is_rejected() {
        let backend = ScriptedBackend::new().disconnected();
        let err = Session::new(Box::new(backend)).unwrap_err();
        assert!(matches!(err, SqlSessionError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn closed_copy_reports_session_closed() {
        let mut session = Session::new(Box::new(ScriptedBackend::new())).expect("session");
        session.close().await.expect("close");
        assert!(!session.is_connected().await);
        assert!(matches!(
            session.begin().await,
            Err(SqlSessionError::SessionClosed)
        ));
        assert!(matches!(
            session.close().await,
            Err(SqlSessionError::SessionClosed)
        ));
    }
}
