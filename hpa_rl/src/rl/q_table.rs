// src/rl/q_table.rs
//
// Hashed action-value store.
//
// Separate chaining over FNV-1a bucket indices. After every insertion the
// table doubles and rehashes once `len / capacity` exceeds MAX_LOAD_FACTOR.
// If the larger bucket array cannot be allocated the table keeps working at
// its current capacity.

use tracing::{debug, warn};

use crate::error::{HpaError, Result};

use super::action_encoding::ACTION_COUNT;
use super::state_key::StateKey;

pub const INITIAL_CAPACITY: usize = 10_000;
pub const MAX_LOAD_FACTOR: f64 = 0.75;

/// Action values for one state.
pub type ActionValues = [f64; ACTION_COUNT];

#[derive(Debug, Clone, PartialEq)]
pub struct QEntry {
    pub key: StateKey,
    pub values: ActionValues,
}

#[derive(Debug, Clone)]
pub struct QTable {
    buckets: Vec<Vec<QEntry>>,
    len: usize,
}

impl Default for QTable {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl QTable {
    /// Empty table with `capacity` buckets (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buckets: vec![Vec::new(); capacity],
            len: 0,
        }
    }

    /// Like `with_capacity`, but returns `None` if the bucket array cannot
    /// be allocated.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        let capacity = capacity.max(1);
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(capacity).ok()?;
        buckets.resize_with(capacity, Vec::new);
        Some(Self { buckets, len: 0 })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    fn bucket_index(key: &StateKey, capacity: usize) -> usize {
        key.fnv1a() as usize % capacity
    }

    fn locate(&self, key: &StateKey) -> (usize, Option<usize>) {
        let b = Self::bucket_index(key, self.capacity());
        let pos = self.buckets[b].iter().position(|e| e.key == *key);
        (b, pos)
    }

    /// Read-only lookup; never allocates.
    pub fn get(&self, key: &StateKey) -> Option<&ActionValues> {
        match self.locate(key) {
            (b, Some(i)) => Some(&self.buckets[b][i].values),
            _ => None,
        }
    }

    /// Values for `key`, inserting an all-zero row if absent.
    ///
    /// Fails only if the bucket cannot grow to hold the new entry.
    pub fn get_or_create(&mut self, key: &StateKey) -> Result<&mut ActionValues> {
        let (b, pos) = self.locate(key);
        let (b, i) = match pos {
            Some(i) => (b, i),
            None => {
                self.buckets[b]
                    .try_reserve(1)
                    .map_err(|e| HpaError::Allocation(format!("q-table entry: {e}")))?;
                self.buckets[b].push(QEntry {
                    key: *key,
                    values: [0.0; ACTION_COUNT],
                });
                self.len += 1;

                if self.load_factor() <= MAX_LOAD_FACTOR || !self.grow() {
                    (b, self.buckets[b].len() - 1)
                } else {
                    match self.locate(key) {
                        (b, Some(i)) => (b, i),
                        _ => {
                            return Err(HpaError::Allocation(
                                "entry missing after rehash".to_string(),
                            ))
                        }
                    }
                }
            }
        };
        Ok(&mut self.buckets[b][i].values)
    }

    pub fn set(&mut self, key: &StateKey, action: usize, value: f64) -> Result<()> {
        if action >= ACTION_COUNT {
            return Err(HpaError::InvalidAction(action));
        }
        self.get_or_create(key)?[action] = value;
        Ok(())
    }

    /// Double capacity and rehash every entry. Returns false, leaving the
    /// table untouched, if the new bucket array cannot be allocated.
    fn grow(&mut self) -> bool {
        let old_capacity = self.capacity();
        let Some(new_capacity) = old_capacity.checked_mul(2) else {
            warn!(old_capacity, "q-table capacity overflow; keeping current size");
            return false;
        };

        let mut fresh: Vec<Vec<QEntry>> = Vec::new();
        if fresh.try_reserve_exact(new_capacity).is_err() {
            warn!(
                old_capacity,
                new_capacity, "q-table rehash allocation failed; keeping current size"
            );
            return false;
        }
        fresh.resize_with(new_capacity, Vec::new);

        for entry in self.buckets.drain(..).flatten() {
            let b = Self::bucket_index(&entry.key, new_capacity);
            fresh[b].push(entry);
        }
        self.buckets = fresh;
        debug!(old_capacity, new_capacity, len = self.len, "q-table rehashed");
        true
    }

    /// Entries in bucket-then-chain order.
    pub fn iter(&self) -> impl Iterator<Item = &QEntry> {
        self.buckets.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::observation::STATE_DIM;

    fn key(i: i32) -> StateKey {
        let mut k = [0; STATE_DIM];
        k[0] = i;
        k[5] = -i;
        StateKey(k)
    }

    #[test]
    fn test_missing_key_created_as_zeros() {
        let mut t = QTable::with_capacity(8);
        assert!(t.get(&key(1)).is_none());
        assert_eq!(*t.get_or_create(&key(1)).unwrap(), [0.0; ACTION_COUNT]);
        assert_eq!(t.len(), 1);
        // Second lookup does not insert again.
        t.get_or_create(&key(1)).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_set_and_get() {
        let mut t = QTable::with_capacity(8);
        t.set(&key(3), 2, 1.5).unwrap();
        assert_eq!(t.get(&key(3)).unwrap()[2], 1.5);
        assert!(t.set(&key(3), ACTION_COUNT, 1.0).is_err());
    }

    #[test]
    fn test_growth_preserves_mappings() {
        let mut t = QTable::with_capacity(4);
        for i in 0..200 {
            t.set(&key(i), (i as usize) % ACTION_COUNT, i as f64).unwrap();
            assert!(t.load_factor() <= MAX_LOAD_FACTOR);
        }
        assert_eq!(t.len(), 200);
        assert!(t.capacity() >= 267);
        for i in 0..200 {
            let v = t.get(&key(i)).unwrap();
            assert_eq!(v[(i as usize) % ACTION_COUNT], i as f64);
        }
        assert_eq!(t.iter().count(), 200);
    }

    #[test]
    fn test_capacity_doubles() {
        let mut t = QTable::with_capacity(4);
        for i in 0..3 {
            t.get_or_create(&key(i)).unwrap();
        }
        assert_eq!(t.capacity(), 4);
        t.get_or_create(&key(3)).unwrap();
        assert_eq!(t.capacity(), 8);
    }

    #[test]
    fn test_zero_capacity_is_usable() {
        let mut t = QTable::with_capacity(0);
        t.get_or_create(&key(9)).unwrap();
        assert_eq!(t.len(), 1);
    }
}
