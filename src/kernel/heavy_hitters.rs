//! Bounded-memory top-K frequency estimator (SpaceSaving / Misra-Gries
//! family). Used both as the per-column mode tracker and, keyed on a
//! row hash, as the duplicate-row detector backing the Uniqueness
//! quality dimension (spec §9).
//!
//! SpaceSaving variant: when the table is full and a new key arrives,
//! the entry with the smallest count is evicted and replaced, with its
//! count (plus an error bound) transferred to the new key. This gives a
//! deterministic over-estimate bound rather than Misra-Gries' decrement
//! step, which tracks true top-K more accurately under skewed streams.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    error: u64,
}

#[derive(Debug, Clone)]
pub struct HeavyHitters<K: Eq + Hash + Clone> {
    capacity: usize,
    table: HashMap<K, Entry>,
}

impl<K: Eq + Hash + Clone> HeavyHitters<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            table: HashMap::with_capacity(capacity),
        }
    }

    pub fn update(&mut self, key: K) {
        if let Some(entry) = self.table.get_mut(&key) {
            entry.count += 1;
            return;
        }
        if self.table.len() < self.capacity {
            self.table.insert(key, Entry { count: 1, error: 0 });
            return;
        }
        // Evict the minimum-count entry, transfer its count and error as
        // the new key's starting point (classic SpaceSaving).
        let min_key = self
            .table
            .iter()
            .min_by_key(|(_, e)| e.count)
            .map(|(k, _)| k.clone());
        if let Some(min_key) = min_key {
            if let Some(evicted) = self.table.remove(&min_key) {
                self.table.insert(
                    key,
                    Entry {
                        count: evicted.count + 1,
                        error: evicted.count,
                    },
                );
            }
        }
    }

    /// Top `n` keys by estimated count, descending.
    pub fn top(&self, n: usize) -> Vec<(K, u64)> {
        let mut entries: Vec<_> = self
            .table
            .iter()
            .map(|(k, e)| (k.clone(), e.count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
