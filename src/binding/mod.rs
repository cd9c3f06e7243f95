//! Binding directives: host values tagged with a direction.
//!
//! A *use* directive feeds values into statement parameters, an *into*
//! directive receives result columns. Directives only borrow the host storage;
//! the statement reads and writes that same storage on every execution.

mod collections;
mod type_binding;

pub use collections::{IntoCollection, KeyExtract};
pub use type_binding::TypeBinding;

use std::sync::{Mutex, PoisonError};

use crate::error::SqlSessionError;
use crate::placeholders::normalize_name;
use crate::types::RowValues;

/// Which way data flows through a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host value to statement parameter.
    Use,
    /// Result column to host value.
    Into,
}

/// Explicit placeholder a directive is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderRef {
    /// A named placeholder, stored without its `:`/`@`/`$` prefix.
    Name(String),
    /// A zero-based slot (use) or column (into) index.
    Position(usize),
}

/// A host value (or collection of values) attached to a statement.
pub struct Binding<'a> {
    pub(crate) kind: BindingKind<'a>,
    pub(crate) placeholder: Option<PlaceholderRef>,
}

pub(crate) enum BindingKind<'a> {
    Use(Box<dyn UseSource + 'a>),
    Into(Box<dyn IntoTarget + 'a>),
}

impl<'a> Binding<'a> {
    /// Attach the directive to a named placeholder (`":name"` or `"name"`).
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.placeholder = Some(PlaceholderRef::Name(normalize_name(name).to_string()));
        self
    }

    /// Attach the directive to a zero-based parameter slot or result column.
    #[must_use]
    pub fn at(mut self, position: usize) -> Self {
        self.placeholder = Some(PlaceholderRef::Position(position));
        self
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.kind {
            BindingKind::Use(_) => Direction::Use,
            BindingKind::Into(_) => Direction::Into,
        }
    }

    #[must_use]
    pub fn placeholder(&self) -> Option<&PlaceholderRef> {
        self.placeholder.as_ref()
    }

    /// Placeholders (use) or columns (into) one element of this directive spans.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match &self.kind {
            BindingKind::Use(source) => source.slot_count(),
            BindingKind::Into(target) => target.slot_count(),
        }
    }

    fn with_kind(kind: BindingKind<'a>) -> Self {
        Self {
            kind,
            placeholder: None,
        }
    }
}

impl std::fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("direction", &self.direction())
            .field("slots", &self.slot_count())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

/// Bind a single host value as input.
///
/// Bind a [`std::sync::Mutex`] to change the value between executions of the
/// same statement.
pub fn use_value<'a, T>(value: &'a T) -> Binding<'a>
where
    T: TypeBinding + Sync,
{
    Binding::with_kind(BindingKind::Use(Box::new(ScalarUse(value))))
}

/// Bind every element of a collection as input; the statement runs once per
/// element.
///
/// Accepts anything iterable by reference: `&vec`, `&set`, `map.values()`.
pub fn use_all<'a, T, I>(values: I) -> Binding<'a>
where
    T: TypeBinding + Sync + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let items: Vec<&'a T> = values.into_iter().collect();
    Binding::with_kind(BindingKind::Use(Box::new(CollectionUse(items))))
}

/// Receive a single result row into `target`.
///
/// The value is overwritten on every run; more than one row per run fails with
/// [`SqlSessionError::TooManyRows`].
pub fn into_value<'a, T>(target: &'a mut T) -> Binding<'a>
where
    T: TypeBinding + Send,
{
    Binding::with_kind(BindingKind::Into(Box::new(ScalarInto(target))))
}

/// Add every result row to `target`. Existing contents are kept.
pub fn into_all<'a, C>(target: &'a mut C) -> Binding<'a>
where
    C: IntoCollection + Send,
{
    Binding::with_kind(BindingKind::Into(Box::new(CollectionInto(target))))
}

/// Add every result row to a collection the caller can inspect between
/// executions of the same statement.
///
/// The lock is taken once per extracted row.
pub fn into_shared<'a, C>(target: &'a Mutex<C>) -> Binding<'a>
where
    C: IntoCollection + Send,
{
    Binding::with_kind(BindingKind::Into(Box::new(SharedCollectionInto(target))))
}

/// Object-safe input side of a directive.
pub(crate) trait UseSource: Send {
    fn slot_count(&self) -> usize;
    /// Number of elements; 1 for scalars.
    fn len(&self) -> usize;
    /// Scalars are broadcast to every element of the bound collections.
    fn is_collection(&self) -> bool;
    fn write_row(&self, index: usize, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError>;
}

/// Object-safe output side of a directive.
pub(crate) trait IntoTarget: Send {
    fn slot_count(&self) -> usize;
    /// False for scalar targets, which accept one row per run.
    fn accepts_many(&self) -> bool;
    fn extract(&mut self, columns: &[RowValues]) -> Result<(), SqlSessionError>;
}

struct ScalarUse<'a, T>(&'a T);

impl<T: TypeBinding + Sync> UseSource for ScalarUse<'_, T> {
    fn slot_count(&self) -> usize {
        T::slot_count()
    }

    fn len(&self) -> usize {
        1
    }

    fn is_collection(&self) -> bool {
        false
    }

    fn write_row(&self, _index: usize, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        self.0.write_to(out)
    }
}

struct CollectionUse<'a, T>(Vec<&'a T>);

impl<T: TypeBinding + Sync> UseSource for CollectionUse<'_, T> {
    fn slot_count(&self) -> usize {
        T::slot_count()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn write_row(&self, index: usize, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
        let item = self.0.get(index).ok_or_else(|| {
            SqlSessionError::BindingMismatch(format!(
                "element {index} requested from a collection of {}",
                self.0.len()
            ))
        })?;
        item.write_to(out)
    }
}

struct ScalarInto<'a, T>(&'a mut T);

impl<T: TypeBinding + Send> IntoTarget for ScalarInto<'_, T> {
    fn slot_count(&self) -> usize {
        T::slot_count()
    }

    fn accepts_many(&self) -> bool {
        false
    }

    fn extract(&mut self, columns: &[RowValues]) -> Result<(), SqlSessionError> {
        *self.0 = T::read_from(columns)?;
        Ok(())
    }
}

struct CollectionInto<'a, C>(&'a mut C);

impl<C: IntoCollection + Send> IntoTarget for CollectionInto<'_, C> {
    fn slot_count(&self) -> usize {
        C::Item::slot_count()
    }

    fn accepts_many(&self) -> bool {
        true
    }

    fn extract(&mut self, columns: &[RowValues]) -> Result<(), SqlSessionError> {
        let item = C::Item::read_from(columns)?;
        self.0.accept(item);
        Ok(())
    }
}

struct SharedCollectionInto<'a, C>(&'a Mutex<C>);

impl<C: IntoCollection + Send> IntoTarget for SharedCollectionInto<'_, C> {
    fn slot_count(&self) -> usize {
        C::Item::slot_count()
    }

    fn accepts_many(&self) -> bool {
        true
    }

    fn extract(&mut self, columns: &[RowValues]) -> Result<(), SqlSessionError> {
        let item = C::Item::read_from(columns)?;
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accept(item);
        Ok(())
    }
}
