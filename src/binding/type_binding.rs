use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SqlSessionError;
use crate::types::RowValues;

/// Bridges a host type to backend parameter slots and result columns.
///
/// Scalars occupy one slot. Aggregate types may span several, in which case
/// `write_to` must push exactly [`slot_count`](Self::slot_count) values and
/// `read_from` receives that many columns:
/// ```rust
/// use sql_session::prelude::*;
///
/// struct Person {
///     last_name: String,
///     age: i64,
/// }
///
/// impl TypeBinding for Person {
///     fn slot_count() -> usize {
///         2
///     }
///
///     fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
///         self.last_name.write_to(out)?;
///         self.age.write_to(out)
///     }
///
///     fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
///         Ok(Person {
///             last_name: String::read_from(&columns[..1])?,
///             age: i64::read_from(&columns[1..2])?,
///         })
///     }
/// }
/// ```
pub trait TypeBinding: Sized {
    /// Number of SQL placeholders (or result columns) the type occupies.
    fn slot_count() -> usize {
        1
    }

    /// Append this value's slot values to `out`.
    ///
    /// # Errors
    /// Returns [`SqlSessionError::ParameterError`] when the value cannot be represented.
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError>;

    /// Build a value from exactly `slot_count()` columns.
    ///
    /// # Errors
    /// Returns [`SqlSessionError::ParameterError`] when a column has an incompatible type.
    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError>;
}

fn single<'c>(columns: &'c [RowValues], ty: &str) -> Result<&'c RowValues, SqlSessionError> {
    match columns {
        [value] => Ok(value),
        _ => Err(SqlSessionError::BindingMismatch(format!(
            "{ty} reads one column, got {}",
            columns.len()
        ))),
    }
}

fn mismatch(ty: &str, value: &RowValues) -> SqlSessionError {
    SqlSessionError::ParameterError(format!(
        "cannot read {} column into {ty}",
        value.kind_name()
    ))
}

macro_rules! impl_int_binding {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TypeBinding for $ty {
                fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
                    out.push(RowValues::Int(i64::from(*self)));
                    Ok(())
                }

                fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
                    match single(columns, stringify!($ty))? {
                        RowValues::Int(i) => <$ty>::try_from(*i).map_err(|_| {
                            SqlSessionError::ParameterError(format!(
                                "{i} is out of range for {}",
                                stringify!($ty)
                            ))
                        }),
                        RowValues::Bool(b) => Ok(<$ty>::from(*b)),
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}

impl_int_binding!(i8, i16, i32, i64, u8, u16, u32);

impl TypeBinding for f64 {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(RowValues::Float(*self));
        Ok(())
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        let value = single(columns, "f64")?;
        value.as_float().ok_or_else(|| mismatch("f64", value))
    }
}

impl TypeBinding for f32 {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(RowValues::Float(f64::from(*self)));
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        let value = single(columns, "f32")?;
        value
            .as_float()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch("f32", value))
    }
}

impl TypeBinding for bool {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(RowValues::Bool(*self));
        Ok(())
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        let value = single(columns, "bool")?;
        value.as_bool().copied().ok_or_else(|| mismatch("bool", value))
    }
}

impl TypeBinding for String {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(RowValues::Text(self.clone()));
        Ok(())
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        let value = single(columns, "String")?;
        value
            .as_text()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl TypeBinding for NaiveDateTime {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(RowValues::Timestamp(*self));
        Ok(())
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        let value = single(columns, "NaiveDateTime")?;
        value
            .as_timestamp()
            .ok_or_else(|| mismatch("NaiveDateTime", value))
    }
}

impl TypeBinding for JsonValue {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(RowValues::JSON(self.clone()));
        Ok(())
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        match single(columns, "JSON")? {
            RowValues::JSON(value) => Ok(value.clone()),
            RowValues::Text(text) => serde_json::from_str(text)
                .map_err(|e| SqlSessionError::ParameterError(format!("invalid JSON column: {e}"))),
            other => Err(mismatch("JSON", other)),
        }
    }
}

impl TypeBinding for RowValues {
    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        out.push(self.clone());
        Ok(())
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        single(columns, "RowValues").cloned()
    }
}

/// `None` binds as NULL in every slot; all-NULL columns read back as `None`.
impl<T: TypeBinding> TypeBinding for Option<T> {
    fn slot_count() -> usize {
        T::slot_count()
    }

    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        match self {
            Some(value) => value.write_to(out),
            None => {
                out.extend(std::iter::repeat_n(RowValues::Null, T::slot_count()));
                Ok(())
            }
        }
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        if columns.iter().all(RowValues::is_null) {
            Ok(None)
        } else {
            T::read_from(columns).map(Some)
        }
    }
}

/// Lets a caller change a bound input between executions of one statement.
impl<T: TypeBinding> TypeBinding for Mutex<T> {
    fn slot_count() -> usize {
        T::slot_count()
    }

    fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        let guard = self
            .lock()
            .map_err(|_| SqlSessionError::ParameterError("bound value mutex poisoned".into()))?;
        guard.write_to(out)
    }

    fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
        T::read_from(columns).map(Mutex::new)
    }
}
