use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::backend::{Backend, Fetched, PreparedId};
use crate::capabilities::Capabilities;
use crate::connector::Connector;
use crate::error::SqlSessionError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// One call the session layer made on a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Prepare { sql: String },
    Bind { stmt: PreparedId, slot: usize, value: RowValues },
    Execute { stmt: PreparedId, max_rows: Option<usize> },
    Fetch { stmt: PreparedId, max_rows: Option<usize> },
    Release { stmt: PreparedId },
    Begin,
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default)]
struct ScriptState {
    canned: HashMap<String, (Arc<Vec<String>>, Vec<Vec<RowValues>>)>,
    statements: HashMap<PreparedId, ScriptStatement>,
    next_id: u64,
    calls: Vec<BackendCall>,
    executions: Vec<(String, Vec<RowValues>)>,
    in_transaction: bool,
    closed: bool,
}

#[derive(Debug)]
struct ScriptStatement {
    sql: String,
    params: BTreeMap<usize, RowValues>,
    position: Option<usize>,
}

/// Deterministic in-memory [`Backend`].
///
/// Statements registered with [`with_rows`](Self::with_rows) return their
/// canned rows through a cursor; any other statement reports one affected
/// row. Every call is recorded and can be inspected through a
/// [`ScriptHandle`] after the backend has been moved into a session.
#[derive(Debug)]
pub struct ScriptedBackend {
    name: String,
    connected: bool,
    capabilities: Capabilities,
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            connected: true,
            capabilities: Capabilities::new(),
            state: Arc::new(Mutex::new(ScriptState {
                next_id: 1,
                ..ScriptState::default()
            })),
        }
    }

    /// Report `name` as the connector key.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Serve `rows` whenever exactly `sql` is executed.
    #[must_use]
    pub fn with_rows(self, sql: &str, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let columns = Arc::new(columns.iter().map(ToString::to_string).collect());
        lock(&self.state).canned.insert(sql.to_string(), (columns, rows));
        self
    }

    #[must_use]
    pub fn with_feature(mut self, name: &str, initial: bool, writable: bool) -> Self {
        self.capabilities = self.capabilities.with_feature(name, initial, writable);
        self
    }

    #[must_use]
    pub fn with_property(mut self, name: &str, initial: RowValues, writable: bool) -> Self {
        self.capabilities = self.capabilities.with_property(name, initial, writable);
        self
    }

    /// A backend that reports it is not connected.
    #[must_use]
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    #[must_use]
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn serve(
    columns: &Arc<Vec<String>>,
    rows: &[Vec<RowValues>],
    position: &mut usize,
    max_rows: Option<usize>,
) -> Fetched {
    let start = (*position).min(rows.len());
    let end = max_rows.map_or(rows.len(), |max| (start + max).min(rows.len()));
    let mut result_set = ResultSet::with_capacity(end - start);
    result_set.set_column_names(Arc::clone(columns));
    for row in &rows[start..end] {
        result_set.add_row_values(row.clone());
    }
    *position = end;
    Fetched {
        rows: result_set,
        exhausted: end == rows.len(),
    }
}

fn unknown(stmt: PreparedId) -> SqlSessionError {
    SqlSessionError::ExecutionError(format!("unknown statement {stmt}"))
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn connector_name(&self) -> &str {
        &self.name
    }

    async fn prepare(&mut self, sql: &str) -> Result<PreparedId, SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Prepare {
            sql: sql.to_string(),
        });
        let id = PreparedId(state.next_id);
        state.next_id += 1;
        state.statements.insert(
            id,
            ScriptStatement {
                sql: sql.to_string(),
                params: BTreeMap::new(),
                position: None,
            },
        );
        Ok(id)
    }

    async fn bind_parameter(
        &mut self,
        stmt: PreparedId,
        slot: usize,
        value: RowValues,
    ) -> Result<(), SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Bind {
            stmt,
            slot,
            value: value.clone(),
        });
        let statement = state.statements.get_mut(&stmt).ok_or_else(|| unknown(stmt))?;
        statement.params.insert(slot, value);
        Ok(())
    }

    async fn execute(
        &mut self,
        stmt: PreparedId,
        max_rows: Option<usize>,
    ) -> Result<Fetched, SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Execute { stmt, max_rows });
        let statement = state.statements.get(&stmt).ok_or_else(|| unknown(stmt))?;
        let sql = statement.sql.clone();
        let params = statement.params.values().cloned().collect();
        state.executions.push((sql.clone(), params));

        let Some((columns, rows)) = state.canned.get(&sql).cloned() else {
            return Ok(Fetched::affected(1));
        };
        let mut position = 0;
        let fetched = serve(&columns, &rows, &mut position, max_rows);
        if let Some(statement) = state.statements.get_mut(&stmt) {
            statement.position = Some(position);
        }
        Ok(fetched)
    }

    async fn fetch(
        &mut self,
        stmt: PreparedId,
        max_rows: Option<usize>,
    ) -> Result<Fetched, SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Fetch { stmt, max_rows });
        let statement = state.statements.get(&stmt).ok_or_else(|| unknown(stmt))?;
        let (Some(mut position), Some((columns, rows))) =
            (statement.position, state.canned.get(&statement.sql).cloned())
        else {
            return Ok(Fetched {
                rows: ResultSet::default(),
                exhausted: true,
            });
        };
        let fetched = serve(&columns, &rows, &mut position, max_rows);
        if let Some(statement) = state.statements.get_mut(&stmt) {
            statement.position = Some(position);
        }
        Ok(fetched)
    }

    async fn release(&mut self, stmt: PreparedId) -> Result<(), SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Release { stmt });
        state.statements.remove(&stmt);
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Begin);
        if state.in_transaction {
            return Err(SqlSessionError::TransactionState(
                "transaction already active".into(),
            ));
        }
        state.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Commit);
        if !state.in_transaction {
            return Err(SqlSessionError::TransactionState("no transaction".into()));
        }
        state.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlSessionError> {
        let mut state = self.state();
        state.calls.push(BackendCall::Rollback);
        if !state.in_transaction {
            return Err(SqlSessionError::TransactionState("no transaction".into()));
        }
        state.in_transaction = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SqlSessionError> {
        {
            let mut state = self.state();
            state.calls.push(BackendCall::Close);
            state.closed = true;
            state.in_transaction = false;
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_transaction(&self) -> bool {
        self.state().in_transaction
    }

    async fn set_feature(&mut self, name: &str, state: bool) -> Result<(), SqlSessionError> {
        self.capabilities.set_feature(name, state)
    }

    async fn get_feature(&self, name: &str) -> Result<bool, SqlSessionError> {
        self.capabilities.get_feature(name)
    }

    async fn set_property(&mut self, name: &str, value: RowValues) -> Result<(), SqlSessionError> {
        self.capabilities.set_property(name, value)
    }

    async fn get_property(&self, name: &str) -> Result<RowValues, SqlSessionError> {
        self.capabilities.get_property(name)
    }
}

/// Inspection side of a [`ScriptedBackend`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    /// Every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|call| pred(call)).count()
    }

    /// SQL and bound parameters (in slot order) of every `execute`.
    #[must_use]
    pub fn executions(&self) -> Vec<(String, Vec<RowValues>)> {
        lock(&self.state).executions.clone()
    }

    /// Statements prepared and not yet released.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        lock(&self.state).statements.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

/// [`Connector`] producing [`ScriptedBackend`]s.
///
/// The connection string `"reject"` fails with
/// [`SqlSessionError::ConnectionError`].
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    name: String,
}

impl ScriptedConnector {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn Backend>, SqlSessionError> {
        if connection_string == "reject" {
            return Err(SqlSessionError::ConnectionError(format!(
                "{} rejected the connection string",
                self.name
            )));
        }
        Ok(Box::new(ScriptedBackend::new().named(&self.name)))
    }
}
