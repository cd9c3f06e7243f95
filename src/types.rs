use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Values exchanged with a backend: bound parameters, fetched columns, and
/// backend property values.
///
/// Every host type that can be bound converts to and from this enum through its
/// [`TypeBinding`](crate::binding::TypeBinding):
/// ```rust
/// use sql_session::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// assert_eq!(params[1].as_text(), Some("alice"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    /// Naive timestamp; backends without a native type store it as text.
    Timestamp(NaiveDateTime),
    Null,
    /// Structured document, stored as text where the backend has no JSON type.
    JSON(JsonValue),
    Blob(Vec<u8>),
}

/// Text layouts accepted when a timestamp column comes back as a string.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in conversion error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "Int",
            RowValues::Float(_) => "Float",
            RowValues::Text(_) => "Text",
            RowValues::Bool(_) => "Bool",
            RowValues::Timestamp(_) => "Timestamp",
            RowValues::Null => "Null",
            RowValues::JSON(_) => "JSON",
            RowValues::Blob(_) => "Blob",
        }
    }

    /// True when both values are the same variant, ignoring the payload.
    #[must_use]
    pub fn same_kind(&self, other: &RowValues) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        match self {
            RowValues::Int(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValues::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Bool columns, or the integers 0 and 1 backends use to store them.
    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        match self {
            RowValues::Bool(flag) => Some(flag),
            RowValues::Int(1) => Some(&true),
            RowValues::Int(0) => Some(&false),
            _ => None,
        }
    }

    /// Timestamp columns, or text in one of the stored timestamp layouts.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(ts) => Some(*ts),
            RowValues::Text(text) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let RowValues::JSON(value) = self {
            Some(value)
        } else {
            None
        }
    }
}
