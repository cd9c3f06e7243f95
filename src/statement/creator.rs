use tracing::debug;

use super::{Limit, Statement};
use crate::binding::Binding;
use crate::error::SqlSessionError;
use crate::session::SharedBackend;

/// One piece accepted by [`StatementCreator::push`].
#[derive(Debug)]
pub enum Fragment<'a> {
    Sql(String),
    Binding(Binding<'a>),
    Limit(Limit),
}

impl From<&str> for Fragment<'_> {
    fn from(sql: &str) -> Self {
        Fragment::Sql(sql.to_string())
    }
}

impl From<String> for Fragment<'_> {
    fn from(sql: String) -> Self {
        Fragment::Sql(sql)
    }
}

impl<'a> From<Binding<'a>> for Fragment<'a> {
    fn from(binding: Binding<'a>) -> Self {
        Fragment::Binding(binding)
    }
}

impl From<Limit> for Fragment<'_> {
    fn from(limit: Limit) -> Self {
        Fragment::Limit(limit)
    }
}

/// Fluent builder for a [`Statement`], obtained from
/// [`Session::compose`](crate::Session::compose).
///
/// SQL fragments are appended verbatim; bindings keep the order they were
/// added in. Finish with [`build`](Self::build) to get a reusable statement or
/// [`execute_now`](Self::execute_now) for a one-shot run.
///
/// ```rust,no_run
/// use sql_session::prelude::*;
///
/// # async fn run(session: &Session) -> Result<(), SqlSessionError> {
/// let (id, name) = (7_i64, String::from("Ann"));
/// session
///     .compose("INSERT INTO person (id, name) VALUES (")
///     .sql(":id, :name)")
///     .bind(use_value(&name).named("name"))
///     .bind(use_value(&id))
///     .execute_now()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[must_use = "a statement creator does nothing until built or executed"]
pub struct StatementCreator<'a> {
    backend: Option<SharedBackend>,
    sql: String,
    bindings: Vec<Binding<'a>>,
    limit: Option<Limit>,
}

impl<'a> StatementCreator<'a> {
    pub(crate) fn new(backend: Option<SharedBackend>, sql: &str) -> Self {
        Self {
            backend,
            sql: sql.to_string(),
            bindings: Vec::new(),
            limit: None,
        }
    }

    /// Append SQL text.
    pub fn sql(mut self, fragment: &str) -> Self {
        self.sql.push_str(fragment);
        self
    }

    /// Add a use or into directive.
    pub fn bind(mut self, binding: Binding<'a>) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Fetch at most `limit.max_rows` rows per [`Statement::execute`]. The last
    /// limit added wins.
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Append any fragment: SQL text, a binding or a limit.
    pub fn push(self, fragment: impl Into<Fragment<'a>>) -> Self {
        match fragment.into() {
            Fragment::Sql(sql) => self.sql(&sql),
            Fragment::Binding(binding) => self.bind(binding),
            Fragment::Limit(limit) => self.limit(limit),
        }
    }

    /// Produce the statement without running it.
    ///
    /// # Errors
    /// [`SqlSessionError::SessionClosed`] when the creating session was closed,
    /// [`SqlSessionError::BindingError`] for a zero-row limit.
    pub fn build(self) -> Result<Statement<'a>, SqlSessionError> {
        let backend = self.backend.ok_or(SqlSessionError::SessionClosed)?;
        if let Some(limit) = self.limit
            && limit.max_rows == 0
        {
            return Err(SqlSessionError::BindingError(
                "limit must allow at least one row".into(),
            ));
        }
        debug!(sql = %self.sql, bindings = self.bindings.len(), "statement built");
        Ok(Statement::new(backend, self.sql, self.bindings, self.limit))
    }

    /// Build the statement, run it once and release it.
    ///
    /// Returns the number of rows fetched (see [`Statement::execute`]).
    ///
    /// # Errors
    /// Any error from [`build`](Self::build) or [`Statement::execute`].
    pub async fn execute_now(self) -> Result<usize, SqlSessionError> {
        let mut statement = self.build()?;
        let result = statement.execute().await;
        let released = statement.close().await;
        let rows = result?;
        released?;
        Ok(rows)
    }
}

impl std::fmt::Debug for StatementCreator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCreator")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .field("limit", &self.limit)
            .finish()
    }
}
