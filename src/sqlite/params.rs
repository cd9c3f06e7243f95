use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single [`RowValues`] to a rusqlite `Value`.
///
/// SQLite has no boolean, timestamp or JSON storage class: booleans become
/// integers, timestamps `%F %T%.f` text and JSON its serialized text.
#[must_use]
pub fn row_value_to_sqlite_value(value: RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(i),
        RowValues::Float(f) => Value::Real(f),
        RowValues::Text(s) => Value::Text(s),
        RowValues::Bool(b) => Value::Integer(i64::from(b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(json) => Value::Text(json.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes),
    }
}

/// Convert a rusqlite `Value` read from a column.
#[must_use]
pub fn sqlite_value_to_row_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}
