//! LRU cache for compiled statements and handlers.
//!
//! Entries are keyed by a `u64` hash that callers compute with
//! [`cache_key`] from whatever identifies the cached value.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Instant;

/// A cached entry.
#[derive(Debug, Clone)]
pub struct CachedEntry<V> {
    /// The cached value.
    pub value: V,
    /// When this entry was last accessed.
    pub last_used: Instant,
    /// Number of times this entry has been requested.
    pub hit_count: u64,
}

/// LRU-style cache.
///
/// When the cache exceeds `max_size`, the least-recently-used entry is evicted.
///
/// # Example
///
/// ```
/// use sqlbulk_query::cache::StatementCache;
///
/// let mut cache = StatementCache::new(100);
/// let sql = cache.get_or_insert(12345, || "DELETE FROM person WHERE id IN ($1)".to_string());
/// assert_eq!(sql, "DELETE FROM person WHERE id IN ($1)");
///
/// let called = std::cell::Cell::new(false);
/// cache.get_or_insert(12345, || {
///     called.set(true);
///     String::new()
/// });
/// assert!(!called.get());
/// ```
#[derive(Debug)]
pub struct StatementCache<V = String> {
    cache: HashMap<u64, CachedEntry<V>>,
    max_size: usize,
}

impl<V> StatementCache<V> {
    /// Create a new cache with the given maximum number of entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(max_size.min(256)),
            max_size,
        }
    }

    /// Get a cached value or build and insert it.
    ///
    /// The `builder` closure is only called on cache miss.
    pub fn get_or_insert(&mut self, key: u64, builder: impl FnOnce() -> V) -> &V {
        if !self.cache.contains_key(&key) && self.cache.len() >= self.max_size {
            self.evict_lru();
        }

        let entry = self.cache.entry(key).or_insert_with(|| CachedEntry {
            value: builder(),
            last_used: Instant::now(),
            hit_count: 0,
        });
        entry.last_used = Instant::now();
        entry.hit_count += 1;
        &entry.value
    }

    /// Get a cached value, marking it as recently used.
    pub fn get(&mut self, key: u64) -> Option<&V> {
        self.cache.get_mut(&key).map(|entry| {
            entry.last_used = Instant::now();
            entry.hit_count += 1;
            &entry.value
        })
    }

    /// Check if a key is cached.
    pub fn contains(&self, key: u64) -> bool {
        self.cache.contains_key(&key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear all cached entries.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Evict the least-recently-used entry.
    fn evict_lru(&mut self) {
        if let Some((&lru_key, _)) = self.cache.iter().min_by_key(|(_, entry)| entry.last_used) {
            self.cache.remove(&lru_key);
        }
    }
}

/// Compute a hash key for caching from any hashable value.
pub fn cache_key(value: &impl Hash) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl<V> Default for StatementCache<V> {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_hit() {
        let mut cache = StatementCache::new(10);
        cache.get_or_insert(1, || "DELETE FROM \"a\"".to_string());

        let called = std::cell::Cell::new(false);
        let sql = cache
            .get_or_insert(1, || {
                called.set(true);
                String::new()
            })
            .clone();
        assert_eq!(sql, "DELETE FROM \"a\"");
        assert!(!called.get());
    }

    #[test]
    fn test_get_marks_recently_used() {
        let mut cache: StatementCache<Arc<u32>> = StatementCache::new(2);
        cache.get_or_insert(1, || Arc::new(1));
        cache.get_or_insert(2, || Arc::new(2));
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(cache.get(1).map(|v| **v), Some(1));

        cache.get_or_insert(3, || Arc::new(3));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn test_eviction_bounds_size() {
        let mut cache = StatementCache::new(2);
        for key in 0..5_u64 {
            cache.get_or_insert(key, || key.to_string());
        }
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_function() {
        assert_eq!(cache_key(&"Person.delete"), cache_key(&"Person.delete"));
        assert_ne!(cache_key(&"Person.delete"), cache_key(&"Person.update"));
    }
}
