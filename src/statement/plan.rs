//! Directive validation and slot assignment, run once before a statement
//! first touches its backend.

use crate::binding::{IntoTarget, PlaceholderRef, UseSource};
use crate::error::SqlSessionError;
use crate::placeholders::PlaceholderMap;
use crate::results::CustomDbRow;
use crate::types::RowValues;

pub(crate) struct UseDirective<'a> {
    pub(crate) source: Box<dyn UseSource + 'a>,
    pub(crate) placeholder: Option<PlaceholderRef>,
    /// Parameter slots this directive writes, filled by [`assign`].
    pub(crate) slots: Vec<usize>,
}

pub(crate) struct IntoDirective<'a> {
    pub(crate) target: Box<dyn IntoTarget + 'a>,
    pub(crate) placeholder: Option<PlaceholderRef>,
    /// First column read, for directives not attached to a column name.
    pub(crate) first_column: usize,
}

/// Validate directives against the placeholders of `map` and assign slots.
///
/// Returns how many times the statement runs per execution: the common length
/// of the bound collections, or 1 when only scalars are bound.
pub(crate) fn assign(
    map: &PlaceholderMap,
    uses: &mut [UseDirective<'_>],
    intos: &mut [IntoDirective<'_>],
) -> Result<usize, SqlSessionError> {
    let runs = common_length(uses)?;

    let wanted: usize = uses.iter().map(|u| u.source.slot_count()).sum();
    if wanted != map.slot_count() {
        return Err(SqlSessionError::BindingMismatch(format!(
            "bound values fill {wanted} placeholders, statement has {}",
            map.slot_count()
        )));
    }

    let mut consumed = vec![false; map.slot_count()];
    for directive in uses.iter_mut() {
        let start = match &directive.placeholder {
            None => continue,
            Some(PlaceholderRef::Position(position)) => *position,
            Some(PlaceholderRef::Name(name)) => map.slot_of(name).ok_or_else(|| {
                SqlSessionError::BindingMismatch(format!("no placeholder named {name}"))
            })?,
        };
        let end = start + directive.source.slot_count();
        if end > consumed.len() {
            return Err(SqlSessionError::BindingMismatch(format!(
                "slots {start}..{end} are out of range for {} placeholders",
                consumed.len()
            )));
        }
        directive.slots = claim(&mut consumed, start..end)?;
    }
    for directive in uses.iter_mut().filter(|u| u.placeholder.is_none()) {
        let free: Vec<usize> = consumed
            .iter()
            .enumerate()
            .filter(|(_, taken)| !**taken)
            .map(|(slot, _)| slot)
            .take(directive.source.slot_count())
            .collect();
        directive.slots = claim(&mut consumed, free)?;
    }

    let mut next_column = 0;
    for directive in intos.iter_mut() {
        match &directive.placeholder {
            Some(PlaceholderRef::Position(column)) => directive.first_column = *column,
            Some(PlaceholderRef::Name(_)) => {}
            None => {
                directive.first_column = next_column;
                next_column += directive.target.slot_count();
            }
        }
    }

    Ok(runs)
}

fn common_length(uses: &[UseDirective<'_>]) -> Result<usize, SqlSessionError> {
    let mut runs: Option<usize> = None;
    for directive in uses.iter().filter(|u| u.source.is_collection()) {
        let len = directive.source.len();
        if len == 0 {
            return Err(SqlSessionError::BindingError(
                "cannot bind an empty collection".into(),
            ));
        }
        match runs {
            Some(expected) if expected != len => {
                return Err(SqlSessionError::BindingMismatch(format!(
                    "bound collections differ in size: {expected} and {len}"
                )));
            }
            _ => runs = Some(len),
        }
    }
    Ok(runs.unwrap_or(1))
}

fn claim(
    consumed: &mut [bool],
    slots: impl IntoIterator<Item = usize>,
) -> Result<Vec<usize>, SqlSessionError> {
    let mut claimed = Vec::new();
    for slot in slots {
        if consumed[slot] {
            return Err(SqlSessionError::BindingMismatch(format!(
                "placeholder slot {slot} is bound twice"
            )));
        }
        consumed[slot] = true;
        claimed.push(slot);
    }
    Ok(claimed)
}

/// Columns of `row` an into directive reads.
pub(crate) fn columns_for<'r>(
    directive: &IntoDirective<'_>,
    row: &'r CustomDbRow,
) -> Result<&'r [RowValues], SqlSessionError> {
    let start = match &directive.placeholder {
        Some(PlaceholderRef::Name(name)) => row.get_column_index(name).ok_or_else(|| {
            SqlSessionError::BindingMismatch(format!("result has no column named {name}"))
        })?,
        _ => directive.first_column,
    };
    let end = start + directive.target.slot_count();
    row.rows.get(start..end).ok_or_else(|| {
        SqlSessionError::BindingMismatch(format!(
            "target reads columns {start}..{end}, row has {}",
            row.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, BindingKind, use_all, use_value};

    fn split(bindings: Vec<Binding<'_>>) -> Vec<UseDirective<'_>> {
        bindings
            .into_iter()
            .map(|b| match b.kind {
                BindingKind::Use(source) => UseDirective {
                    source,
                    placeholder: b.placeholder,
                    slots: Vec::new(),
                },
                BindingKind::Into(_) => panic!("use directives only"),
            })
            .collect()
    }

    #[test]
    fn explicit_references_claim_slots_before_the_rest() {
        let map = PlaceholderMap::parse("SELECT :a, :b, :c").expect("parse");
        let (x, y, z) = (1_i64, 2_i64, 3_i64);
        let mut uses = split(vec![use_value(&x), use_value(&y).named("b"), use_value(&z)]);
        let runs = assign(&map, &mut uses, &mut []).expect("assign");
        assert_eq!(runs, 1);
        assert_eq!(uses[0].slots, vec![0]);
        assert_eq!(uses[1].slots, vec![1]);
        assert_eq!(uses[2].slots, vec![2]);
    }

    #[test]
    fn collections_must_agree_on_length() {
        let map = PlaceholderMap::parse("INSERT INTO t VALUES (?, ?)").expect("parse");
        let (a, b) = (vec![1, 2, 3], vec![1, 2, 3, 4]);
        let mut uses = split(vec![use_all(&a), use_all(&b)]);
        let err = assign(&map, &mut uses, &mut []).err();
        assert!(matches!(err, Some(SqlSessionError::BindingMismatch(_))));
    }

    #[test]
    fn scalars_are_broadcast_over_collections() {
        let map = PlaceholderMap::parse("INSERT INTO t VALUES (?, ?)").expect("parse");
        let (ids, tag) = (vec![1, 2, 3], String::from("x"));
        let mut uses = split(vec![use_all(&ids), use_value(&tag)]);
        assert_eq!(assign(&map, &mut uses, &mut []).expect("assign"), 3);
    }

    #[test]
    fn empty_collection_is_a_binding_error() {
        let map = PlaceholderMap::parse("INSERT INTO t VALUES (?)").expect("parse");
        let empty: Vec<i64> = Vec::new();
        let mut uses = split(vec![use_all(&empty)]);
        let err = assign(&map, &mut uses, &mut []).err();
        assert!(matches!(err, Some(SqlSessionError::BindingError(_))));
    }

    #[test]
    fn double_binding_a_slot_is_rejected() {
        let map = PlaceholderMap::parse("SELECT ?, ?").expect("parse");
        let (x, y) = (1_i64, 2_i64);
        let mut uses = split(vec![use_value(&x).at(1), use_value(&y).at(1)]);
        let err = assign(&map, &mut uses, &mut []).err();
        assert!(matches!(err, Some(SqlSessionError::BindingMismatch(_))));
    }
}
