use async_trait::async_trait;

use crate::error::SqlSessionError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Handle to a statement prepared by a [`Backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreparedId(pub u64);

impl std::fmt::Display for PreparedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// One chunk produced by [`Backend::execute`] or [`Backend::fetch`].
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    /// Rows of this chunk, in cursor order. For statements that return no rows,
    /// `rows.rows_affected` carries the number of rows changed.
    pub rows: ResultSet,
    /// No further rows remain on the cursor.
    ///
    /// Must be exact: a chunk that happens to end on the last row reports
    /// `true`.
    pub exhausted: bool,
}

impl Fetched {
    /// Chunk for a statement that changed rows but returned none.
    #[must_use]
    pub fn affected(rows_affected: usize) -> Self {
        Self {
            rows: ResultSet::affected(rows_affected),
            exhausted: true,
        }
    }
}

/// Connector-specific implementation of one database connection.
///
/// The session layer drives it through this contract only; SQL dialects,
/// network or file I/O and native driver calls stay behind it.
///
/// Parameter slots are zero-based and refer to the placeholder order reported
/// by [`PlaceholderMap`](crate::placeholders::PlaceholderMap).
///
/// Feature and property methods default to
/// [`SqlSessionError::UnsupportedCapability`]; backends that expose
/// capabilities usually delegate to a [`Capabilities`](crate::Capabilities)
/// table.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Key of the connector that produced this backend, e.g. `"sqlite"`.
    fn connector_name(&self) -> &str;

    /// Prepare `sql` once; the handle is reused for every execution.
    async fn prepare(&mut self, sql: &str) -> Result<PreparedId, SqlSessionError>;

    /// Set the value of one parameter slot for the next [`execute`](Self::execute).
    async fn bind_parameter(
        &mut self,
        stmt: PreparedId,
        slot: usize,
        value: RowValues,
    ) -> Result<(), SqlSessionError>;

    /// Run the statement from scratch with the currently bound parameters,
    /// discarding any open cursor, and return up to `max_rows` rows
    /// (`None` = all of them).
    async fn execute(
        &mut self,
        stmt: PreparedId,
        max_rows: Option<usize>,
    ) -> Result<Fetched, SqlSessionError>;

    /// Continue the open cursor of `stmt`, returning up to `max_rows` rows.
    async fn fetch(
        &mut self,
        stmt: PreparedId,
        max_rows: Option<usize>,
    ) -> Result<Fetched, SqlSessionError>;

    /// Forget a prepared statement and its cursor.
    async fn release(&mut self, stmt: PreparedId) -> Result<(), SqlSessionError>;

    async fn begin(&mut self) -> Result<(), SqlSessionError>;

    async fn commit(&mut self) -> Result<(), SqlSessionError>;

    async fn rollback(&mut self) -> Result<(), SqlSessionError>;

    /// Release the connection. Called once, by the last session sharing it.
    async fn close(&mut self) -> Result<(), SqlSessionError>;

    fn is_connected(&self) -> bool;

    fn is_transaction(&self) -> bool;

    async fn set_feature(&mut self, name: &str, _state: bool) -> Result<(), SqlSessionError> {
        Err(SqlSessionError::UnsupportedCapability(name.to_string()))
    }

    async fn get_feature(&self, name: &str) -> Result<bool, SqlSessionError> {
        Err(SqlSessionError::UnsupportedCapability(name.to_string()))
    }

    async fn set_property(
        &mut self,
        name: &str,
        _value: RowValues,
    ) -> Result<(), SqlSessionError> {
        Err(SqlSessionError::UnsupportedCapability(name.to_string()))
    }

    async fn get_property(&self, name: &str) -> Result<RowValues, SqlSessionError> {
        Err(SqlSessionError::UnsupportedCapability(name.to_string()))
    }
}
