//! Decision cache for Mend
//!
//! Generic TTL key/value cache used to memoize expensive heuristics
//! (split decisions, complexity reports) so identical inputs within the
//! TTL window yield identical answers without repeated work.
//!
//! # Error Handling
//!
//! Cache operations never fail; a poisoned lock is treated as an empty
//! cache because every cached value can be recomputed from its inputs.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Default capacity before LRU eviction kicks in
const DEFAULT_CAPACITY: usize = 256;

/// Compute the stable content digest used for every cache key.
///
/// One digest everywhere: SHA-256, hex-encoded. Callers must not mix in
/// process-local hashes; they differ across runs and would break the
/// idempotence guarantees the split engine relies on.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// A TTL + LRU cache with interior locking.
///
/// `get` refreshes recency and drops expired entries; `set` evicts the
/// least-recently-used entry once the cache is at capacity.
pub struct DecisionCache<K, V> {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> DecisionCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a cached value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(_) => return None,
        };
        let now = Utc::now();

        let expired = match entries.get(key) {
            Some(entry) => now.signed_duration_since(entry.inserted_at) > self.ttl,
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.last_used = now;
        Some(entry.value.clone())
    }

    /// Store a value, evicting the least-recently-used entry at capacity.
    pub fn set(&self, key: K, value: V) {
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(_) => return,
        };
        let now = Utc::now();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            let now = Utc::now();
            let ttl = self.ttl;
            entries.retain(|_, e| now.signed_duration_since(e.inserted_at) <= ttl);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_digest_is_stable() {
        let a = content_digest("def foo():\n    pass\n");
        let b = content_digest("def foo():\n    pass\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_content_digest_differs_on_change() {
        assert_ne!(content_digest("a = 1"), content_digest("a = 2"));
    }

    #[test]
    fn test_get_set_round_trip() {
        let cache: DecisionCache<String, u32> = DecisionCache::new(Duration::hours(1));
        cache.set("k".to_string(), 7);
        assert_eq!(cache.get(&"k".to_string()), Some(7));
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache: DecisionCache<String, u32> = DecisionCache::new(Duration::seconds(-1));
        cache.set("k".to_string(), 7);
        assert_eq!(cache.get(&"k".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let cache: DecisionCache<u32, u32> = DecisionCache::with_capacity(Duration::hours(1), 2);
        cache.set(1, 10);
        cache.set(2, 20);
        // Touch 1 so 2 becomes the eviction candidate
        let _ = cache.get(&1);
        cache.set(3, 30);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn test_purge_expired_retains_fresh() {
        let cache: DecisionCache<u32, u32> = DecisionCache::new(Duration::hours(1));
        cache.set(1, 10);
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
    }
}
