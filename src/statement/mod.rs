//! Statement execution and chunked extraction.

mod creator;
mod plan;

pub use creator::{Fragment, StatementCreator};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::backend::{Backend, PreparedId};
use crate::binding::{Binding, BindingKind};
use crate::error::SqlSessionError;
use crate::placeholders::PlaceholderMap;
use crate::results::ResultSet;
use crate::session::{SharedBackend, release_shared};
use crate::types::RowValues;
use plan::{IntoDirective, UseDirective};

/// Maximum number of rows one [`Statement::execute`] call fetches.
///
/// With a soft limit the statement stays resumable and the next call continues
/// where this one stopped. A hard limit turns "more rows remain" into
/// [`SqlSessionError::LimitExceeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub max_rows: usize,
    #[serde(default)]
    pub is_hard: bool,
}

impl Limit {
    #[must_use]
    pub fn new(max_rows: usize) -> Self {
        Self {
            max_rows,
            is_hard: false,
        }
    }

    #[must_use]
    pub fn hard(max_rows: usize) -> Self {
        Self {
            max_rows,
            is_hard: true,
        }
    }
}

/// Execution progress of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    NotExecuted,
    /// Rows (or bulk elements) remain for the next `execute` call.
    Executing,
    /// The current run finished; the next `execute` starts a fresh run.
    Done,
}

/// SQL text plus its bindings, executable any number of times.
///
/// The statement borrows its bound host values for `'a` and reads/writes that
/// same storage on every call. Into targets are never cleared: chunks and
/// whole re-runs append to collections.
///
/// The statement keeps its session's connection alive. Dropping it releases
/// the prepared handle in the background; [`close`](Self::close) does the
/// same deterministically.
pub struct Statement<'a> {
    /// Always set; taken only by `Drop`.
    backend: Option<SharedBackend>,
    sql: String,
    uses: Vec<UseDirective<'a>>,
    intos: Vec<IntoDirective<'a>>,
    limit: Option<Limit>,
    state: StatementState,
    prepared: Option<Prepared>,
    /// Bulk element whose result is being read.
    use_row: usize,
    cursor_open: bool,
    rows_in_run: usize,
    rows_affected: usize,
}

#[derive(Debug, Clone, Copy)]
struct Prepared {
    id: PreparedId,
    runs: usize,
}

impl<'a> Statement<'a> {
    pub(crate) fn new(
        backend: SharedBackend,
        sql: String,
        bindings: Vec<Binding<'a>>,
        limit: Option<Limit>,
    ) -> Self {
        let mut uses = Vec::new();
        let mut intos = Vec::new();
        for binding in bindings {
            match binding.kind {
                BindingKind::Use(source) => uses.push(UseDirective {
                    source,
                    placeholder: binding.placeholder,
                    slots: Vec::new(),
                }),
                BindingKind::Into(target) => intos.push(IntoDirective {
                    target,
                    placeholder: binding.placeholder,
                    first_column: 0,
                }),
            }
        }
        Self {
            backend: Some(backend),
            sql,
            uses,
            intos,
            limit,
            state: StatementState::NotExecuted,
            prepared: None,
            use_row: 0,
            cursor_open: false,
            rows_in_run: 0,
            rows_affected: 0,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    #[must_use]
    pub fn state(&self) -> StatementState {
        self.state
    }

    /// True once the current run has no rows left. False before the first execute.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == StatementState::Done
    }

    /// Rows extracted since the current run started.
    #[must_use]
    pub fn rows_in_run(&self) -> usize {
        self.rows_in_run
    }

    /// Rows reported by the backend during the last `execute` call: rows
    /// returned for queries, rows changed for other statements.
    #[must_use]
    pub fn rows_affected(&self) -> usize {
        self.rows_affected
    }

    /// Fetch the next chunk of rows into the bound targets.
    ///
    /// The first call validates the bindings and prepares the SQL; binding
    /// errors are reported before the backend sees anything. A call on a
    /// finished statement starts a fresh run from the first row.
    ///
    /// Returns the number of rows extracted by this call.
    ///
    /// # Errors
    /// * [`SqlSessionError::BindingError`] for an empty bound collection.
    /// * [`SqlSessionError::BindingMismatch`] when collection sizes differ,
    ///   the bound values do not fill the placeholders, or a row lacks the
    ///   columns a target reads.
    /// * [`SqlSessionError::TooManyRows`] when a scalar target receives a
    ///   second row in one run.
    /// * [`SqlSessionError::LimitExceeded`] when a hard limit is reached with
    ///   rows still pending.
    ///
    /// Targets may be partially filled when an error is returned mid-fetch.
    pub async fn execute(&mut self) -> Result<usize, SqlSessionError> {
        let backend = self.shared()?;
        let mut backend = backend.lock().await;
        let prepared = self.prepare(&mut **backend).await?;

        if self.state == StatementState::Done {
            debug!(stmt = %prepared.id, "starting a fresh run");
            self.use_row = 0;
            self.cursor_open = false;
            self.rows_in_run = 0;
        }
        self.state = StatementState::Executing;
        self.rows_affected = 0;

        let mut fetched = 0;
        loop {
            let want = self.limit.map(|limit| limit.max_rows - fetched);
            let chunk = if self.cursor_open {
                backend.fetch(prepared.id, want).await?
            } else {
                for (slot, value) in self.parameters()? {
                    trace!(stmt = %prepared.id, slot, ?value, "binding parameter");
                    backend.bind_parameter(prepared.id, slot, value).await?;
                }
                let chunk = backend.execute(prepared.id, want).await?;
                self.cursor_open = true;
                chunk
            };

            let count = chunk.rows.len();
            self.rows_affected += chunk.rows.rows_affected;
            self.extract(&chunk.rows)?;
            fetched += count;

            let exhausted = chunk.exhausted || want.is_none_or(|want| count < want);
            if exhausted {
                self.cursor_open = false;
                self.use_row += 1;
                if self.use_row >= prepared.runs {
                    self.state = StatementState::Done;
                    break;
                }
            }
            if want.is_some_and(|want| count >= want) {
                break;
            }
        }

        debug!(
            stmt = %prepared.id,
            fetched,
            run_total = self.rows_in_run,
            done = self.is_done(),
            "execute finished"
        );

        if let Some(limit) = self.limit
            && limit.is_hard
            && !self.is_done()
        {
            self.state = StatementState::Done;
            self.cursor_open = false;
            return Err(SqlSessionError::LimitExceeded(limit.max_rows));
        }
        Ok(fetched)
    }

    /// Execute until the current run is done, returning the rows extracted.
    ///
    /// # Errors
    /// As [`execute`](Self::execute).
    pub async fn execute_all(&mut self) -> Result<usize, SqlSessionError> {
        let mut total = self.execute().await?;
        while !self.is_done() {
            total += self.execute().await?;
        }
        Ok(total)
    }

    /// Release the prepared handle now instead of on drop.
    ///
    /// # Errors
    /// The backend's release failure.
    pub async fn close(mut self) -> Result<(), SqlSessionError> {
        if let Some(prepared) = self.prepared.take() {
            self.shared()?.lock().await.release(prepared.id).await?;
        }
        Ok(())
    }

    fn shared(&self) -> Result<SharedBackend, SqlSessionError> {
        self.backend.clone().ok_or(SqlSessionError::SessionClosed)
    }

    async fn prepare(&mut self, backend: &mut dyn Backend) -> Result<Prepared, SqlSessionError> {
        if let Some(prepared) = self.prepared {
            return Ok(prepared);
        }
        let map = PlaceholderMap::parse(&self.sql)?;
        let runs = plan::assign(&map, &mut self.uses, &mut self.intos)?;
        let id = backend.prepare(&self.sql).await?;
        debug!(stmt = %id, slots = map.slot_count(), runs, "statement prepared");
        let prepared = Prepared { id, runs };
        self.prepared = Some(prepared);
        Ok(prepared)
    }

    /// Values for every parameter slot of the current bulk element.
    fn parameters(&self) -> Result<Vec<(usize, RowValues)>, SqlSessionError> {
        let mut params = Vec::new();
        for directive in &self.uses {
            let index = if directive.source.is_collection() {
                self.use_row
            } else {
                0
            };
            let mut values = Vec::with_capacity(directive.slots.len());
            directive.source.write_row(index, &mut values)?;
            if values.len() != directive.slots.len() {
                return Err(SqlSessionError::BindingMismatch(format!(
                    "value wrote {} parameters, expected {}",
                    values.len(),
                    directive.slots.len()
                )));
            }
            params.extend(directive.slots.iter().copied().zip(values));
        }
        Ok(params)
    }

    fn extract(&mut self, rows: &ResultSet) -> Result<(), SqlSessionError> {
        for row in &rows.results {
            for directive in &mut self.intos {
                if self.rows_in_run > 0 && !directive.target.accepts_many() {
                    return Err(SqlSessionError::TooManyRows(format!(
                        "single-value target received row {} of this run",
                        self.rows_in_run + 1
                    )));
                }
                let columns = plan::columns_for(directive, row)?;
                directive.target.extract(columns)?;
            }
            self.rows_in_run += 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("limit", &self.limit)
            .field("rows_in_run", &self.rows_in_run)
            .finish_non_exhaustive()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        let Some(backend) = self.backend.take() else {
            return;
        };
        let Some(prepared) = self.prepared.take() else {
            release_shared(backend);
            return;
        };
        // Without a runtime the handle goes away with the backend itself.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            release_shared(backend);
            return;
        };
        handle.spawn(async move {
            let result = backend.lock().await.release(prepared.id).await;
            if let Err(err) = result {
                warn!(stmt = %prepared.id, error = %err, "releasing dropped statement failed");
            }
            release_shared(backend);
        });
    }
}
