//! Field-by-field comparison of keyed values with optional per-key overrides.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

/// Custom equality for one key. Returns `true` when the values are equal.
pub type Comparator<V> = Box<dyn Fn(&V, &V) -> bool>;

/// Registry of per-key comparison overrides; keys without an override fall
/// back to `PartialEq`.
pub struct Comparators<K, V> {
    by_key: HashMap<K, Comparator<V>>,
}

impl<K, V> Comparators<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
        }
    }

    pub fn insert<F>(&mut self, key: K, comparator: F) -> Option<Comparator<V>>
    where
        F: Fn(&V, &V) -> bool + 'static,
    {
        self.by_key.insert(key, Box::new(comparator))
    }

    pub fn remove(&mut self, key: &K) -> Option<Comparator<V>> {
        self.by_key.remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn values_equal(&self, key: &K, left: &V, right: &V) -> bool {
        match self.by_key.get(key) {
            Some(comparator) => comparator(left, right),
            None => left == right,
        }
    }
}

impl<K, V> Default for Comparators<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Comparators<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_key.keys()).finish()
    }
}

/// Compare every entry of `left` against the value `lookup` finds for the same
/// key.
///
/// The result maps each key of `left` to `true` when the two sides differ. A
/// key that `lookup` cannot find counts as a difference, so the comparison is
/// not commutative.
pub fn compare_values<'a, 'b, K, V, I, F>(
    left: I,
    lookup: F,
    comparators: &Comparators<K, V>,
) -> BTreeMap<K, bool>
where
    K: Ord + Eq + Hash + Clone + 'a,
    V: PartialEq + 'a + 'b,
    I: IntoIterator<Item = (&'a K, &'a V)>,
    F: Fn(&K) -> Option<&'b V>,
{
    left.into_iter()
        .map(|(key, value)| {
            let differs = lookup(key)
                .is_none_or(|other| !comparators.values_equal(key, value, other));
            (key.clone(), differs)
        })
        .collect()
}

/// [`compare_values`] for two maps.
pub fn compare_maps<K, V>(
    left: &BTreeMap<K, V>,
    right: &BTreeMap<K, V>,
    comparators: &Comparators<K, V>,
) -> BTreeMap<K, bool>
where
    K: Ord + Eq + Hash + Clone,
    V: PartialEq,
{
    compare_values(left, |key| right.get(key), comparators)
}

/// Short-circuiting form of [`compare_values`]: `true` when no key of `left`
/// differs.
pub fn all_equal<'a, 'b, K, V, I, F>(left: I, lookup: F, comparators: &Comparators<K, V>) -> bool
where
    K: Eq + Hash + 'a,
    V: PartialEq + 'a + 'b,
    I: IntoIterator<Item = (&'a K, &'a V)>,
    F: Fn(&K) -> Option<&'b V>,
{
    left.into_iter().all(|(key, value)| {
        lookup(key).is_some_and(|other| comparators.values_equal(key, value, other))
    })
}
