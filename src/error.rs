use thiserror::Error;

/// Every failure the session layer can report.
///
/// Each kind is its own variant so callers can branch on it (for example to
/// probe a backend feature and fall back when it is unsupported):
/// ```rust
/// use sql_session::prelude::*;
///
/// let err = SqlSessionError::UnsupportedCapability("bulk_mode".into());
/// assert!(matches!(err, SqlSessionError::UnsupportedCapability(_)));
/// ```
#[derive(Debug, Error)]
pub enum SqlSessionError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("No connector registered for key: {0}")]
    ConnectorNotFound(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Transaction state error: {0}")]
    TransactionState(String),

    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("Binding mismatch: {0}")]
    BindingMismatch(String),

    #[error("Binding error: {0}")]
    BindingError(String),

    #[error("Too many rows: {0}")]
    TooManyRows(String),

    #[error("Hard limit of {0} rows exceeded")]
    LimitExceeded(usize),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Placeholder error: {0}")]
    PlaceholderError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl From<tokio::task::JoinError> for SqlSessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        SqlSessionError::ExecutionError(format!("Backend worker task failed: {err}"))
    }
}
