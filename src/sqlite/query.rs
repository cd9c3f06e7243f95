use std::sync::Arc;

use rusqlite::types::Value;

use super::params::sqlite_value_to_row_value;
use crate::error::SqlSessionError;
use crate::results::ResultSet;

/// What running one statement produced.
#[derive(Debug)]
pub(crate) enum QueryOutcome {
    Rows(ResultSet),
    Affected(usize),
}

/// Run a cached statement with positional parameters.
///
/// Statements without result columns are executed for their row count; all
/// others are read to the end into one [`ResultSet`].
pub(crate) fn run_cached(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<QueryOutcome, SqlSessionError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let params = rusqlite::params_from_iter(params.iter());

    if stmt.column_count() == 0 {
        return Ok(QueryOutcome::Affected(stmt.execute(params)?));
    }

    let column_names: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(16);
    result_set.set_column_names(column_names);

    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            row_values.push(sqlite_value_to_row_value(value));
        }
        result_set.add_row_values(row_values);
    }
    Ok(QueryOutcome::Rows(result_set))
}

/// Name of every parameter `sql` declares, in `SQLite`'s index order.
/// Anonymous `?` parameters have no name.
pub(crate) fn parameter_names(
    conn: &rusqlite::Connection,
    sql: &str,
) -> Result<Vec<Option<String>>, SqlSessionError> {
    let stmt = conn.prepare_cached(sql)?;
    Ok((1..=stmt.parameter_count())
        .map(|index| stmt.parameter_name(index).map(str::to_string))
        .collect())
}
