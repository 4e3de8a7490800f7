//! LRU storage for query results.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;

use crate::util::lock::{rw_read, rw_write};

use super::config::QueryCacheConfig;
use super::keys::{QueryFilter, QueryKey};

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT: &str = "eden_query_cache_evict_total";

/// One cached query result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Value,
    /// Wall-clock time of the last write, for display.
    pub updated_at: OffsetDateTime,
    /// Set by invalidation; the next fetch ignores freshness.
    pub invalidated: bool,
    written_at: Instant,
}

impl CacheEntry {
    fn new(data: Value) -> Self {
        Self {
            data,
            updated_at: OffsetDateTime::now_utc(),
            invalidated: false,
            written_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated && self.written_at.elapsed() < stale_time
    }
}

pub struct QueryStore {
    entries: RwLock<LruCache<QueryKey, CacheEntry>>,
}

impl QueryStore {
    pub fn new(config: &QueryCacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.cache_limit_non_zero())),
        }
    }

    /// Read an entry and mark it most recently used.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        rw_write(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Store `data` under `key`, returning the key evicted to make room.
    pub fn set(&self, key: QueryKey, data: Value) -> Option<QueryKey> {
        let evicted = rw_write(&self.entries, SOURCE, "set")
            .push(key.clone(), CacheEntry::new(data))
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);
        if evicted.is_some() {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        evicted
    }

    /// Mark matching entries stale. Returns how many were marked.
    pub fn invalidate(&self, filter: &QueryFilter) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if filter.matches(key) {
                entry.invalidated = true;
                marked += 1;
            }
        }
        marked
    }

    /// Drop matching entries. Returns how many were removed.
    pub fn remove(&self, filter: &QueryFilter) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "remove");
        let doomed: Vec<QueryKey> = entries
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn keys(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        rw_read(&self.entries, SOURCE, "keys")
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
