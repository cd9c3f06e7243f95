use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};

use super::type_binding::TypeBinding;

/// Supplies the map key for values extracted into a keyed collection.
pub trait KeyExtract {
    type Key;

    fn key(&self) -> Self::Key;
}

/// A host collection that fetched rows can be added to.
///
/// Rows are only ever added: a collection bound with
/// [`into_all`](crate::binding::into_all) keeps what it already held and
/// grows across chunks and across repeated runs of the same statement.
pub trait IntoCollection {
    type Item: TypeBinding;

    fn accept(&mut self, item: Self::Item);
}

impl<T: TypeBinding> IntoCollection for Vec<T> {
    type Item = T;

    fn accept(&mut self, item: T) {
        self.push(item);
    }
}

impl<T: TypeBinding> IntoCollection for VecDeque<T> {
    type Item = T;

    fn accept(&mut self, item: T) {
        self.push_back(item);
    }
}

impl<T: TypeBinding + Ord> IntoCollection for BTreeSet<T> {
    type Item = T;

    fn accept(&mut self, item: T) {
        self.insert(item);
    }
}

impl<T, S> IntoCollection for HashSet<T, S>
where
    T: TypeBinding + Hash + Eq,
    S: BuildHasher,
{
    type Item = T;

    fn accept(&mut self, item: T) {
        self.insert(item);
    }
}

impl<K, T> IntoCollection for BTreeMap<K, T>
where
    K: Ord,
    T: TypeBinding + KeyExtract<Key = K>,
{
    type Item = T;

    fn accept(&mut self, item: T) {
        self.insert(item.key(), item);
    }
}

impl<K, T, S> IntoCollection for HashMap<K, T, S>
where
    K: Hash + Eq,
    T: TypeBinding + KeyExtract<Key = K>,
    S: BuildHasher,
{
    type Item = T;

    fn accept(&mut self, item: T) {
        self.insert(item.key(), item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlSessionError;
    use crate::types::RowValues;

    #[derive(Debug, PartialEq)]
    struct Tagged(i64);

    impl TypeBinding for Tagged {
        fn write_to(&self, out: &mut Vec<RowValues>) -> Result<(), SqlSessionError> {
            self.0.write_to(out)
        }

        fn read_from(columns: &[RowValues]) -> Result<Self, SqlSessionError> {
            i64::read_from(columns).map(Tagged)
        }
    }

    impl KeyExtract for Tagged {
        type Key = i64;

        fn key(&self) -> i64 {
            self.0 % 10
        }
    }

    #[test]
    fn maps_key_by_extracted_value() {
        let mut map: BTreeMap<i64, Tagged> = BTreeMap::new();
        map.accept(Tagged(11));
        map.accept(Tagged(21));
        map.accept(Tagged(12));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&Tagged(21)));
    }

    #[test]
    fn sets_ignore_duplicates() {
        let mut set: BTreeSet<i64> = BTreeSet::new();
        set.accept(3_i64);
        set.accept(3_i64);
        assert_eq!(set.len(), 1);
    }
}
