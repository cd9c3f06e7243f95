//! Helper utilities for testing and development.

use std::sync::Arc;

use crate::results::CustomDbRow;
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// `count` single-column integer rows numbered from 1.
#[must_use]
pub fn numbered_rows(count: i64) -> Vec<Vec<RowValues>> {
    (1..=count).map(|n| vec![RowValues::Int(n)]).collect()
}
