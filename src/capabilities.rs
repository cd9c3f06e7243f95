//! Declarative feature/property table for backends.

use std::collections::BTreeMap;

use crate::error::SqlSessionError;
use crate::types::RowValues;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    writable: bool,
}

/// Named boolean features and typed properties a backend exposes.
///
/// Names are declared up front; anything else is
/// [`SqlSessionError::UnsupportedCapability`], as is writing a read-only entry.
///
/// ```rust
/// use sql_session::prelude::*;
///
/// let mut caps = Capabilities::new()
///     .with_feature("autocommit", true, false)
///     .with_property("busy_timeout", RowValues::Int(0), true);
///
/// caps.set_property("busy_timeout", RowValues::Int(250))?;
/// assert_eq!(caps.get_property("busy_timeout")?, RowValues::Int(250));
/// assert!(caps.set_feature("autocommit", false).is_err());
/// # Ok::<(), SqlSessionError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    features: BTreeMap<String, Entry<bool>>,
    properties: BTreeMap<String, Entry<RowValues>>,
}

impl Capabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a feature with its initial state.
    #[must_use]
    pub fn with_feature(mut self, name: &str, initial: bool, writable: bool) -> Self {
        self.features.insert(
            name.to_string(),
            Entry {
                value: initial,
                writable,
            },
        );
        self
    }

    /// Declare a property with its initial value. The value's kind is kept on writes.
    #[must_use]
    pub fn with_property(mut self, name: &str, initial: RowValues, writable: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            Entry {
                value: initial,
                writable,
            },
        );
        self
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for undeclared names.
    pub fn get_feature(&self, name: &str) -> Result<bool, SqlSessionError> {
        self.features
            .get(name)
            .map(|entry| entry.value)
            .ok_or_else(|| SqlSessionError::UnsupportedCapability(name.to_string()))
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for undeclared or read-only features.
    pub fn set_feature(&mut self, name: &str, state: bool) -> Result<(), SqlSessionError> {
        let entry = self
            .features
            .get_mut(name)
            .ok_or_else(|| SqlSessionError::UnsupportedCapability(name.to_string()))?;
        if !entry.writable {
            return Err(SqlSessionError::UnsupportedCapability(format!(
                "{name} is read-only"
            )));
        }
        entry.value = state;
        Ok(())
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for undeclared names.
    pub fn get_property(&self, name: &str) -> Result<RowValues, SqlSessionError> {
        self.properties
            .get(name)
            .map(|entry| entry.value.clone())
            .ok_or_else(|| SqlSessionError::UnsupportedCapability(name.to_string()))
    }

    /// # Errors
    /// [`SqlSessionError::UnsupportedCapability`] for undeclared or read-only
    /// properties, [`SqlSessionError::ParameterError`] when `value` is not NULL
    /// and differs in kind from the declared value.
    pub fn set_property(&mut self, name: &str, value: RowValues) -> Result<(), SqlSessionError> {
        let entry = self
            .properties
            .get_mut(name)
            .ok_or_else(|| SqlSessionError::UnsupportedCapability(name.to_string()))?;
        if !entry.writable {
            return Err(SqlSessionError::UnsupportedCapability(format!(
                "{name} is read-only"
            )));
        }
        if !value.is_null() && !entry.value.is_null() && !value.same_kind(&entry.value) {
            return Err(SqlSessionError::ParameterError(format!(
                "property {name} expects {}, got {}",
                entry.value.kind_name(),
                value.kind_name()
            )));
        }
        entry.value = value;
        Ok(())
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}
