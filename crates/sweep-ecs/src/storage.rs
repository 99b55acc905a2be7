//! Storage capability set and the sparse-set storage used by the world.
//!
//! [`Storage`] is the small interface the deferred-removal decorator is
//! written against. [`SparseSet`] is the concrete indexed container: a dense
//! key array with a parallel value array, plus a hash index from key to
//! position so lookups are O(1).

use std::{fmt, hash::Hash, ops::Range};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::error::StorageResult;

/// Handle type a storage can be indexed by.
pub trait Key: Copy + Eq + Hash + fmt::Debug + 'static {}

impl<T: Copy + Eq + Hash + fmt::Debug + 'static> Key for T {}

/// How a storage closes the gap left by a physical removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Shift the tail down. Keeps the relative order of the remaining keys.
    #[default]
    InPlace,
    /// Move the last entry into the hole. O(1), but reorders the tail.
    SwapAndPop,
}

/// Capacity and layout policy shared by a storage and its pending list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Entries reserved up front in the storage.
    pub capacity: usize,
    /// Keys reserved up front in the pending-deletion list.
    pub pending_capacity: usize,
    pub policy: DeletionPolicy,
}

/// Minimal operation set a wrapped storage must expose.
///
/// Positions returned by [`Storage::find`] index into [`Storage::keys`] and
/// stay valid until the next physical removal or insertion.
pub trait Storage {
    type Key: Key;
    type Value;

    /// Number of physically present entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a key to its current position, or `None` if absent.
    fn find(&self, key: Self::Key) -> Option<usize>;

    fn contains(&self, key: Self::Key) -> bool {
        self.find(key).is_some()
    }

    fn get(&self, key: Self::Key) -> Option<&Self::Value>;

    fn get_mut(&mut self, key: Self::Key) -> Option<&mut Self::Value>;

    /// Insert or replace the value for `key`, returning the previous value.
    fn insert(
        &mut self,
        key: Self::Key,
        value: Self::Value,
    ) -> StorageResult<Option<Self::Value>, Self::Key>;

    /// Physically remove the entries at `positions`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    fn remove_at(&mut self, positions: Range<usize>);

    /// Removal entry point. Immediate by default; keys that are not present
    /// are ignored.
    fn remove<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = Self::Key>,
    {
        for key in keys {
            if let Some(position) = self.find(key) {
                self.remove_at(position..position + 1);
            }
        }
    }

    /// Present keys in position order.
    fn keys(&self) -> &[Self::Key];

    fn reserve(&mut self, additional: usize);
}

/// Indexed container mapping keys to values, with `()` values for plain sets.
pub struct SparseSet<K, V = ()> {
    dense: Vec<K>,
    values: Vec<V>,
    index: HashMap<K, usize, FxBuildHasher>,
    policy: DeletionPolicy,
}

impl<K: Key, V> Default for SparseSet<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V> SparseSet<K, V> {
    /// Empty set with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Empty set with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(&StorageConfig {
            capacity,
            ..StorageConfig::default()
        })
    }

    /// Empty set using the capacity and policy of `config`.
    #[must_use]
    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            dense: Vec::with_capacity(config.capacity),
            values: Vec::with_capacity(config.capacity),
            index: HashMap::with_capacity_and_hasher(config.capacity, FxBuildHasher),
            policy: config.policy,
        }
    }

    /// How physical removals close gaps.
    #[must_use]
    pub const fn policy(&self) -> DeletionPolicy {
        self.policy
    }

    /// Iterate `(key, value)` pairs in position order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.dense.iter().copied().zip(self.values.iter())
    }

    /// Values in position order.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.dense.clear();
        self.values.clear();
        self.index.clear();
    }

    /// Re-point the index for every key from `start` to the end.
    fn reindex_from(&mut self, start: usize) {
        for (position, key) in self.dense.iter().enumerate().skip(start) {
            self.index.insert(*key, position);
        }
    }
}

impl<K: Key, V> Storage for SparseSet<K, V> {
    type Key = K;
    type Value = V;

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn find(&self, key: K) -> Option<usize> {
        self.index.get(&key).copied()
    }

    fn get(&self, key: K) -> Option<&V> {
        self.find(key).map(|position| &self.values[position])
    }

    fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.find(key).map(|position| &mut self.values[position])
    }

    fn insert(&mut self, key: K, value: V) -> StorageResult<Option<V>, K> {
        if let Some(position) = self.find(key) {
            return Ok(Some(std::mem::replace(&mut self.values[position], value)));
        }

        self.index.insert(key, self.dense.len());
        self.dense.push(key);
        self.values.push(value);
        Ok(None)
    }

    fn remove_at(&mut self, positions: Range<usize>) {
        assert!(
            positions.start <= positions.end && positions.end <= self.dense.len(),
            "position range {positions:?} out of bounds for storage of length {}",
            self.dense.len()
        );

        for key in &self.dense[positions.clone()] {
            self.index.remove(key);
        }

        match self.policy {
            DeletionPolicy::InPlace => {
                self.dense.drain(positions.clone());
                self.values.drain(positions.clone());
                self.reindex_from(positions.start);
            }
            DeletionPolicy::SwapAndPop => {
                // High to low, so every entry swapped in comes from outside the range.
                for position in positions.rev() {
                    self.dense.swap_remove(position);
                    self.values.swap_remove(position);
                    if let Some(moved) = self.dense.get(position) {
                        self.index.insert(*moved, position);
                    }
                }
            }
        }
    }

    fn keys(&self) -> &[K] {
        &self.dense
    }

    fn reserve(&mut self, additional: usize) {
        self.dense.reserve(additional);
        self.values.reserve(additional);
        self.index.reserve(additional);
    }
}

impl<K: Key, V> fmt::Debug for SparseSet<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseSet")
            .field("keys", &self.dense)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(policy: DeletionPolicy) -> SparseSet<u32, char> {
        let mut set = SparseSet::with_config(&StorageConfig {
            policy,
            ..StorageConfig::default()
        });
        for (key, value) in (1..=5).zip('a'..) {
            set.insert(key, value).unwrap();
        }
        set
    }

    #[test]
    fn test_insert_find_get() {
        let set = filled(DeletionPolicy::InPlace);

        assert_eq!(set.len(), 5);
        assert_eq!(set.find(1), Some(0));
        assert_eq!(set.find(5), Some(4));
        assert_eq!(set.find(9), None);
        assert_eq!(set.get(3), Some(&'c'));
        assert_eq!(set.keys(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_insert_replaces() {
        let mut set = filled(DeletionPolicy::InPlace);

        assert_eq!(set.insert(2, 'z'), Ok(Some('b')));
        assert_eq!(set.len(), 5);
        assert_eq!(set.get(2), Some(&'z'));
    }

    #[test]
    fn test_in_place_keeps_order() {
        let mut set = filled(DeletionPolicy::InPlace);

        set.remove([2, 4]);

        assert_eq!(set.keys(), &[1, 3, 5]);
        assert_eq!(set.values(), &['a', 'c', 'e']);
        assert_eq!(set.find(5), Some(2));
        assert!(!set.contains(2));
    }

    #[test]
    fn test_remove_range() {
        let mut set = filled(DeletionPolicy::InPlace);

        set.remove_at(1..3);

        assert_eq!(set.keys(), &[1, 4, 5]);
        assert_eq!(set.find(4), Some(1));
        assert_eq!(set.get(5), Some(&'e'));
    }

    #[test]
    fn test_swap_and_pop_reindexes() {
        let mut set = filled(DeletionPolicy::SwapAndPop);

        set.remove_at(1..3);

        assert_eq!(set.len(), 3);
        assert!(!set.contains(2));
        assert!(!set.contains(3));
        for key in [1, 4, 5] {
            let position = set.find(key).unwrap();
            assert_eq!(set.keys()[position], key);
        }
        assert_eq!(set.get(4), Some(&'d'));
        assert_eq!(set.get(5), Some(&'e'));
    }

    #[test]
    fn test_immediate_remove_ignores_absent() {
        let mut set = filled(DeletionPolicy::InPlace);

        set.remove([42]);

        assert_eq!(set.len(), 5);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_remove_at_out_of_bounds() {
        let mut set = filled(DeletionPolicy::InPlace);
        set.remove_at(4..6);
    }
}
