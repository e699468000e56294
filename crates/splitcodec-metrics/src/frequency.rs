//! String-keyed frequency map
//!
//! Keys are never evicted. The maps built on this type identify call sites and
//! flags that need attention, so their key space is expected to stay small.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent insert-or-increment map from string keys to counts
#[derive(Debug, Default)]
pub struct FrequencyMap {
    entries: DashMap<String, AtomicU64>,
}

impl FrequencyMap {
    /// Create an empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Increment `key` by one
    #[inline]
    pub fn increment(&self, key: &str) {
        self.add(key, 1);
    }

    /// Increment `key` by `n`, inserting it on first sight
    pub fn add(&self, key: &str, n: u64) {
        // Existing keys only need a shard read lock.
        if let Some(count) = self.entries.get(key) {
            count.fetch_add(n, Ordering::Relaxed);
            return;
        }
        self.entries
            .entry(key.to_owned())
            .or_default()
            .fetch_add(n, Ordering::Relaxed);
    }

    /// Count recorded for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> u64 {
        self.entries
            .get(key)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Number of distinct keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no key has been recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted copy of every entry
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Drop every key
    pub fn reset(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_insert_or_increment() {
        let map = FrequencyMap::new();
        map.increment("src/lib.rs:10");
        map.increment("src/lib.rs:10");
        map.add("src/main.rs:3", 5);

        assert_eq!(map.get("src/lib.rs:10"), 2);
        assert_eq!(map.get("src/main.rs:3"), 5);
        assert_eq!(map.get("missing"), 0);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn frequency_snapshot_is_sorted() {
        let map = FrequencyMap::new();
        map.increment("b");
        map.increment("a");
        map.increment("c");

        let keys: Vec<_> = map.snapshot().into_keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn frequency_concurrent_increments() {
        let map = FrequencyMap::new();
        std::thread::scope(|s| {
            for t in 0..4 {
                let map = &map;
                s.spawn(move || {
                    for i in 0..1000 {
                        map.increment(if i % 2 == 0 { "even" } else { "odd" });
                        map.increment(&format!("thread-{t}"));
                    }
                });
            }
        });

        assert_eq!(map.get("even"), 2000);
        assert_eq!(map.get("odd"), 2000);
        assert_eq!(map.get("thread-3"), 1000);
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn frequency_reset() {
        let map = FrequencyMap::new();
        map.increment("x");
        map.reset();
        assert!(map.is_empty());
    }
}
