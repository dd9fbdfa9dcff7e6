//! Bounded eviction store: per-key ledgers kept in most-recently-used order.

use std::collections::hash_map::{self, HashMap};
use std::collections::vec_deque::{self, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("no ledger has been initialised for key {0}")]
    KeyNotInitialized(String),
    #[error("no matching record in the ledger for key {0}")]
    NotFound(String),
}

/// Records for one key, most recently used first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger<R> {
    records: VecDeque<R>,
}

impl<R> Ledger<R> {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn front(&self) -> Option<&R> {
        self.records.front()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, R> {
        self.records.iter()
    }

    /// Drop records from the tail until at most `max` remain. Returns how many
    /// were dropped.
    fn truncate_to(&mut self, max: Option<usize>) -> usize {
        match max {
            Some(max) if self.records.len() > max => {
                let evicted = self.records.len() - max;
                self.records.truncate(max);
                evicted
            }
            _ => 0,
        }
    }
}

impl<R> Default for Ledger<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Index<usize> for Ledger<R> {
    type Output = R;

    fn index(&self, index: usize) -> &R {
        &self.records[index]
    }
}

impl<R> FromIterator<R> for Ledger<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<R> IntoIterator for Ledger<R> {
    type Item = R;
    type IntoIter = vec_deque::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, R> IntoIterator for &'a Ledger<R> {
    type Item = &'a R;
    type IntoIter = vec_deque::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Mapping from key to a capacity-bounded [`Ledger`].
///
/// The capacity is shared by every ledger; `None` means unbounded. Inserting
/// past the capacity evicts the least recently used record (the tail).
#[derive(Debug, Clone)]
pub struct LedgerStore<K, R> {
    ledgers: HashMap<K, Ledger<R>>,
    capacity: Option<usize>,
}

impl<K, R> LedgerStore<K, R>
where
    K: Eq + Hash + fmt::Debug,
{
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            ledgers: HashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Change the capacity. Existing ledgers longer than the new capacity are
    /// shrunk from the tail right away; the return value is the number of
    /// records evicted.
    pub fn set_capacity(&mut self, capacity: Option<usize>) -> usize {
        self.capacity = capacity;
        self.ledgers
            .values_mut()
            .map(|ledger| ledger.truncate_to(capacity))
            .sum()
    }

    pub fn get_or_create(&mut self, key: K) -> &mut Ledger<R> {
        self.ledgers.entry(key).or_default()
    }

    pub fn get(&self, key: &K) -> Option<&Ledger<R>> {
        self.ledgers.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.ledgers.contains_key(key)
    }

    /// Insert `record` as the most recently used entry of `key`'s ledger.
    ///
    /// Returns the record evicted from the tail, if the ledger overflowed.
    /// The ledger must have been created with [`Self::get_or_create`] (or by
    /// [`Self::insert_ledger`]) first.
    pub fn push_front(&mut self, key: &K, record: R) -> Result<Option<R>, LedgerError> {
        let capacity = self.capacity;
        let ledger = self
            .ledgers
            .get_mut(key)
            .ok_or_else(|| LedgerError::KeyNotInitialized(format!("{key:?}")))?;

        ledger.records.push_front(record);
        match capacity {
            Some(max) if ledger.records.len() > max => Ok(ledger.records.pop_back()),
            _ => Ok(None),
        }
    }

    /// Find the first record, scanning from the front, that satisfies
    /// `predicate`, and promote it to the front of its ledger.
    pub fn find<P>(&mut self, key: &K, predicate: P) -> Result<&R, LedgerError>
    where
        P: FnMut(&R) -> bool,
    {
        let not_found = || LedgerError::NotFound(format!("{key:?}"));
        let ledger = self.ledgers.get_mut(key).ok_or_else(not_found)?;
        let index = ledger
            .records
            .iter()
            .position(predicate)
            .ok_or_else(not_found)?;

        if index > 0 {
            if let Some(record) = ledger.records.remove(index) {
                ledger.records.push_front(record);
            }
        }

        ledger.records.front().ok_or_else(not_found)
    }

    pub fn front_mut(&mut self, key: &K) -> Option<&mut R> {
        self.ledgers
            .get_mut(key)
            .and_then(|ledger| ledger.records.front_mut())
    }

    /// Remove the front record of `key`'s ledger when it satisfies `predicate`.
    pub fn remove_front_if<P>(&mut self, key: &K, predicate: P) -> Option<R>
    where
        P: FnOnce(&R) -> bool,
    {
        let ledger = self.ledgers.get_mut(key)?;
        if ledger.records.front().is_some_and(predicate) {
            ledger.records.pop_front()
        } else {
            None
        }
    }

    /// Install a whole ledger for `key`, truncated to the current capacity.
    pub fn insert_ledger(&mut self, key: K, mut ledger: Ledger<R>) -> Option<Ledger<R>> {
        ledger.truncate_to(self.capacity);
        self.ledgers.insert(key, ledger)
    }

    /// Empty every ledger, keeping the keys.
    pub fn clear_all(&mut self) {
        for ledger in self.ledgers.values_mut() {
            ledger.records.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, Ledger<R>> {
        self.ledgers.iter()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, K, Ledger<R>> {
        self.ledgers.keys()
    }
}

impl<K, R> Default for LedgerStore<K, R>
where
    K: Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: Option<usize>) -> LedgerStore<&'static str, i32> {
        let mut store = LedgerStore::new(capacity);
        store.get_or_create("f");
        store
    }

    fn contents(store: &LedgerStore<&'static str, i32>) -> Vec<i32> {
        store.get(&"f").unwrap().iter().copied().collect()
    }

    #[test]
    fn push_front_keeps_most_recent_first() {
        let mut store = store(None);
        for i in 0..4 {
            assert_eq!(store.push_front(&"f", i).unwrap(), None);
        }
        assert_eq!(contents(&store), vec![3, 2, 1, 0]);
    }

    #[test]
    fn push_front_evicts_the_tail_when_full() {
        let mut store = store(Some(3));
        for i in 0..3 {
            store.push_front(&"f", i).unwrap();
        }
        assert_eq!(store.push_front(&"f", 3).unwrap(), Some(0));
        assert_eq!(store.push_front(&"f", 4).unwrap(), Some(1));
        assert_eq!(contents(&store), vec![4, 3, 2]);
    }

    #[test]
    fn push_front_requires_an_initialised_key() {
        let mut store = store(None);
        assert_eq!(
            store.push_front(&"g", 1),
            Err(LedgerError::KeyNotInitialized("\"g\"".into()))
        );
    }

    #[test]
    fn find_promotes_the_match() {
        let mut store = store(None);
        for i in 0..4 {
            store.push_front(&"f", i).unwrap();
        }
        assert_eq!(store.find(&"f", |r| *r == 1), Ok(&1));
        assert_eq!(contents(&store), vec![1, 3, 2, 0]);
    }

    #[test]
    fn find_reports_missing_records_and_keys() {
        let mut store = store(None);
        store.push_front(&"f", 1).unwrap();
        assert!(matches!(store.find(&"f", |r| *r == 7), Err(LedgerError::NotFound(_))));
        assert!(matches!(store.find(&"g", |_| true), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn shrinking_capacity_truncates_existing_ledgers() {
        let mut store = store(None);
        for i in 0..5 {
            store.push_front(&"f", i).unwrap();
        }
        assert_eq!(store.set_capacity(Some(3)), 2);
        assert_eq!(contents(&store), vec![4, 3, 2]);
        assert_eq!(store.capacity(), Some(3));

        assert_eq!(store.set_capacity(None), 0);
        store.push_front(&"f", 5).unwrap();
        assert_eq!(contents(&store).len(), 4);
    }

    #[test]
    fn clear_all_keeps_keys() {
        let mut store = store(None);
        store.push_front(&"f", 1).unwrap();
        store.clear_all();
        assert!(store.contains_key(&"f"));
        assert!(store.get(&"f").unwrap().is_empty());
    }

    #[test]
    fn remove_front_if_only_removes_matching_front() {
        let mut store = store(None);
        store.push_front(&"f", 1).unwrap();
        store.push_front(&"f", 2).unwrap();
        assert_eq!(store.remove_front_if(&"f", |r| *r == 1), None);
        assert_eq!(store.remove_front_if(&"f", |r| *r == 2), Some(2));
        assert_eq!(contents(&store), vec![1]);
    }

    #[test]
    fn ledgers_serialize_as_sequences() {
        let ledger: Ledger<i32> = [3, 2, 1].into_iter().collect();
        assert_eq!(serde_json::to_string(&ledger).unwrap(), "[3,2,1]");
    }
}
