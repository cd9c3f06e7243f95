use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value;
use tracing::debug;

use super::config::{SqliteOptions, default_busy_timeout_ms};
use super::params::row_value_to_sqlite_value;
use super::query::QueryOutcome;
use super::worker::SqliteWorker;
use crate::backend::{Backend, Fetched, PreparedId};
use crate::capabilities::Capabilities;
use crate::error::SqlSessionError;
use crate::placeholders::PlaceholderMap;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

pub(crate) const FOREIGN_KEYS: &str = "foreign_keys";
pub(crate) const BUSY_TIMEOUT: &str = "busy_timeout";
pub(crate) const SQLITE_VERSION: &str = "sqlite_version";

/// [`Backend`] over one rusqlite connection.
///
/// Query results are read completely on `execute` and handed out in chunks
/// from an in-memory cursor.
#[derive(Debug)]
pub struct SqliteBackend {
    worker: Option<SqliteWorker>,
    statements: HashMap<PreparedId, PreparedSql>,
    next_id: u64,
    capabilities: Capabilities,
}

#[derive(Debug)]
struct PreparedSql {
    sql: Arc<String>,
    /// Slot read by each `SQLite` parameter, in parameter index order.
    slot_of_param: Vec<usize>,
    /// Bound value per slot.
    values: Vec<Value>,
    cursor: Option<Cursor>,
}

impl PreparedSql {
    fn params(&self) -> Vec<Value> {
        self.slot_of_param
            .iter()
            .map(|&slot| self.values[slot].clone())
            .collect()
    }
}

/// Map `SQLite`'s parameters onto placeholder slots.
///
/// `SQLite` numbers `$N` by first appearance and keeps `:a` and `@a` apart,
/// so parameters are matched by name: `?N`/`$N` read slot `N - 1`, other
/// names their named slot, and nameless ones the anonymous slots in order.
fn slot_table(
    map: &PlaceholderMap,
    names: &[Option<String>],
) -> Result<Vec<usize>, SqlSessionError> {
    let mut anonymous = map
        .names()
        .enumerate()
        .filter(|(_, name)| name.is_none())
        .map(|(slot, _)| slot);
    names
        .iter()
        .map(|name| {
            let slot = match name.as_deref() {
                None => anonymous.next(),
                Some(name) => match marker_number(name) {
                    Some(number) => number.checked_sub(1),
                    None => map.slot_of(name),
                },
            };
            slot.filter(|slot| *slot < map.slot_count()).ok_or_else(|| {
                SqlSessionError::PlaceholderError(format!(
                    "SQLite parameter {} has no matching placeholder",
                    name.as_deref().unwrap_or("?")
                ))
            })
        })
        .collect()
}

fn marker_number(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(['?', '$'])?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug)]
struct Cursor {
    column_names: Option<Arc<Vec<String>>>,
    rows: VecDeque<CustomDbRow>,
}

impl Cursor {
    fn take(&mut self, max_rows: Option<usize>) -> Fetched {
        let count = max_rows.map_or(self.rows.len(), |max| max.min(self.rows.len()));
        let mut rows = ResultSet::with_capacity(count);
        if let Some(column_names) = &self.column_names {
            rows.set_column_names(Arc::clone(column_names));
        }
        rows.results.extend(self.rows.drain(..count));
        rows.rows_affected = count;
        Fetched {
            rows,
            exhausted: self.rows.is_empty(),
        }
    }
}

impl SqliteBackend {
    /// Open the database described by `options`.
    ///
    /// # Errors
    /// [`SqlSessionError::ConnectionError`] if the database cannot be opened or
    /// configured.
    pub async fn open(options: SqliteOptions) -> Result<Self, SqlSessionError> {
        let path = options.db_path.clone();
        let conn = tokio::task::spawn_blocking(move || rusqlite::Connection::open(&path))
            .await?
            .map_err(|err| {
                SqlSessionError::ConnectionError(format!(
                    "failed to open SQLite database {}: {err}",
                    options.db_path
                ))
            })?;

        let busy_timeout = options.busy_timeout_ms;
        conn.busy_timeout(Duration::from_millis(busy_timeout))
            .map_err(|err| SqlSessionError::ConnectionError(err.to_string()))?;
        conn.pragma_update(None, FOREIGN_KEYS, options.foreign_keys)
            .map_err(|err| SqlSessionError::ConnectionError(err.to_string()))?;

        let worker = SqliteWorker::spawn(conn, &options.db_path)?;
        debug!(db_path = %options.db_path, "sqlite connection opened");

        let capabilities = Capabilities::new()
            .with_feature(FOREIGN_KEYS, options.foreign_keys, true)
            .with_property(
                BUSY_TIMEOUT,
                RowValues::Int(i64::try_from(busy_timeout).unwrap_or(i64::MAX)),
                true,
            )
            .with_property(
                SQLITE_VERSION,
                RowValues::Text(rusqlite::version().to_string()),
                false,
            );

        Ok(Self {
            worker: Some(worker),
            statements: HashMap::new(),
            next_id: 1,
            capabilities,
        })
    }

    fn worker(&self) -> Result<&SqliteWorker, SqlSessionError> {
        self.worker
            .as_ref()
            .ok_or_else(|| SqlSessionError::ConnectionError("SQLite connection is closed".into()))
    }

    fn statement(&mut self, stmt: PreparedId) -> Result<&mut PreparedSql, SqlSessionError> {
        self.statements
            .get_mut(&stmt)
            .ok_or_else(|| SqlSessionError::ExecutionError(format!("unknown statement {stmt}")))
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn connector_name(&self) -> &str {
        "sqlite"
    }

    async fn prepare(&mut self, sql: &str) -> Result<PreparedId, SqlSessionError> {
        let map = PlaceholderMap::parse(sql)?;
        let sql = Arc::new(sql.to_string());
        let names = self.worker()?.prepare(Arc::clone(&sql)).await?;
        let slot_of_param = slot_table(&map, &names)?;
        let id = PreparedId(self.next_id);
        self.next_id += 1;
        self.statements.insert(
            id,
            PreparedSql {
                sql,
                slot_of_param,
                values: vec![Value::Null; map.slot_count()],
                cursor: None,
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
        let prepared = self.statement(stmt)?;
        let count = prepared.values.len();
        let param = prepared.values.get_mut(slot).ok_or_else(|| {
            SqlSessionError::ParameterError(format!(
                "parameter slot {slot} out of range, {stmt} takes {count}"
            ))
        })?;
        *param = row_value_to_sqlite_value(value);
        Ok(())
    }

    async fn execute(
        &mut self,
        stmt: PreparedId,
        max_rows: Option<usize>,
    ) -> Result<Fetched, SqlSessionError> {
        let (sql, params) = {
            let prepared = self.statement(stmt)?;
            prepared.cursor = None;
            (Arc::clone(&prepared.sql), prepared.params())
        };
        let outcome = self.worker()?.run(sql, params).await?;
        match outcome {
            QueryOutcome::Affected(count) => Ok(Fetched::affected(count)),
            QueryOutcome::Rows(result_set) => {
                let mut cursor = Cursor {
                    column_names: result_set.get_column_names().cloned(),
                    rows: result_set.results.into(),
                };
                let fetched = cursor.take(max_rows);
                if !fetched.exhausted {
                    self.statement(stmt)?.cursor = Some(cursor);
                }
                Ok(fetched)
            }
        }
    }

    async fn fetch(
        &mut self,
        stmt: PreparedId,
        max_rows: Option<usize>,
    ) -> Result<Fetched, SqlSessionError> {
        let prepared = self.statement(stmt)?;
        let Some(cursor) = prepared.cursor.as_mut() else {
            return Ok(Fetched {
                rows: ResultSet::default(),
                exhausted: true,
            });
        };
        let fetched = cursor.take(max_rows);
        if fetched.exhausted {
            prepared.cursor = None;
        }
        Ok(fetched)
    }

    async fn release(&mut self, stmt: PreparedId) -> Result<(), SqlSessionError> {
        self.statements.remove(&stmt);
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), SqlSessionError> {
        self.worker()?.execute_batch("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), SqlSessionError> {
        self.worker()?.execute_batch("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlSessionError> {
        self.worker()?.execute_batch("ROLLBACK").await
    }

    async fn close(&mut self) -> Result<(), SqlSessionError> {
        self.statements.clear();
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await?;
            debug!("sqlite connection closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.worker.is_some()
    }

    fn is_transaction(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(SqliteWorker::in_transaction)
    }

    async fn set_feature(&mut self, name: &str, state: bool) -> Result<(), SqlSessionError> {
        // Validate against the table before touching the connection.
        self.capabilities.get_feature(name)?;
        if name == FOREIGN_KEYS {
            self.worker()?
                .with_connection(move |conn| {
                    conn.pragma_update(None, FOREIGN_KEYS, state)?;
                    Ok(())
                })
                .await?;
        }
        self.capabilities.set_feature(name, state)
    }

    async fn get_feature(&self, name: &str) -> Result<bool, SqlSessionError> {
        self.capabilities.get_feature(name)
    }

    /// `busy_timeout` takes milliseconds; NULL restores the default timeout.
    async fn set_property(
        &mut self,
        name: &str,
        mut value: RowValues,
    ) -> Result<(), SqlSessionError> {
        if name == BUSY_TIMEOUT {
            self.capabilities.get_property(name)?;
            let millis = if value.is_null() {
                default_busy_timeout_ms()
            } else {
                value
                    .as_int()
                    .and_then(|ms| u64::try_from(*ms).ok())
                    .ok_or_else(|| {
                        SqlSessionError::ParameterError(format!(
                            "{BUSY_TIMEOUT} expects a non-negative Int, got {value:?}"
                        ))
                    })?
            };
            value = RowValues::Int(i64::try_from(millis).unwrap_or(i64::MAX));
            self.worker()?
                .with_connection(move |conn| {
                    conn.busy_timeout(Duration::from_millis(millis))?;
                    Ok(())
                })
                .await?;
        }
        self.capabilities.set_property(name, value)
    }

    async fn get_property(&self, name: &str) -> Result<RowValues, SqlSessionError> {
        self.capabilities.get_property(name)
    }
}
