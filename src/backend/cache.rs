//! LRU cache of parsed values, partitioned by isolation tag.

use std::sync::{Arc, Mutex};

use lru_cache::LruCache;

use crate::domain::Value;

/// Bound on the number of isolation tags tracked at once. Tags beyond the
/// bound evict least-recently-used partitions wholesale.
const MAX_ISOLATION_TAGS: usize = 64;

/// Per-isolation-tag LRU of parsed values, keyed by blockchain key.
///
/// The lock is held only for point reads and writes, never across an
/// upstream call, so two concurrent requests for the same missing key may
/// both resolve it; the later writer wins.
pub(crate) struct ValueCache {
    max_entries: usize,
    tags: Mutex<LruCache<String, LruCache<String, Arc<Value>>>>,
}

impl ValueCache {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            tags: Mutex::new(LruCache::new(MAX_ISOLATION_TAGS)),
        }
    }

    pub(crate) fn get(&self, tag: &str, key: &str) -> Option<Arc<Value>> {
        let mut tags = self.tags.lock().unwrap();
        tags.get_mut(tag)?.get_mut(key).cloned()
    }

    pub(crate) fn insert(&self, tag: &str, key: &str, value: Arc<Value>) {
        let mut tags = self.tags.lock().unwrap();
        if !tags.contains_key(tag) {
            tags.insert(tag.to_owned(), LruCache::new(self.max_entries));
        }
        if let Some(partition) = tags.get_mut(tag) {
            partition.insert(key.to_owned(), value);
        }
    }

    /// Total number of cached values across all partitions.
    pub(crate) fn len(&self) -> usize {
        let mut tags = self.tags.lock().unwrap();
        tags.iter().map(|(_, partition)| partition.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value() -> Arc<Value> {
        Arc::new(Value::default())
    }

    #[test]
    fn hit_and_miss() {
        let cache = ValueCache::new(4);
        assert!(cache.get("", "d/a").is_none());
        cache.insert("", "d/a", value());
        assert!(cache.get("", "d/a").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tags_are_isolated() {
        let cache = ValueCache::new(4);
        cache.insert("circuit-1", "d/a", value());
        assert!(cache.get("circuit-2", "d/a").is_none());
        assert!(cache.get("circuit-1", "d/a").is_some());
    }

    #[test]
    fn evicts_least_recently_used_per_tag() {
        let cache = ValueCache::new(2);
        cache.insert("", "d/a", value());
        cache.insert("", "d/b", value());
        // touch d/a so d/b is the eviction candidate
        assert!(cache.get("", "d/a").is_some());
        cache.insert("", "d/c", value());
        assert!(cache.get("", "d/b").is_none());
        assert!(cache.get("", "d/a").is_some());
        assert!(cache.get("", "d/c").is_some());
    }
}
