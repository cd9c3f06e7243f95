use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::types::RowValues;

/// One chunk of rows handed back by a backend, or the outcome of a statement
/// that produced no rows.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the backend
    pub results: Vec<CustomDbRow>,
    /// Rows returned, or rows affected for statements without a result set
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with room for `capacity` rows
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Result of a statement that changed rows but returned none.
    #[must_use]
    pub fn affected(rows_affected: usize) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set.
    ///
    /// Rows added before [`set_column_names`](Self::set_column_names) get
    /// positional names (`column0`, `column1`, ...).
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if self.column_names.is_none() {
            let names = (0..row_values.len()).map(|i| format!("column{i}")).collect();
            self.set_column_names(Arc::new(names));
        }
        let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        else {
            return;
        };
        self.results.push(CustomDbRow {
            column_names: Arc::clone(column_names),
            rows: row_values,
            column_index_cache: Arc::clone(column_index),
        });
        self.rows_affected += 1;
    }

    /// Number of rows in this chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
