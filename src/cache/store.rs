//! Cache storage implementations.
//!
//! `ResolvedStore`: bounded LRU of resolved documents keyed by document id.
//! `TtlStore`: bounded LRU whose entries also expire after a fixed duration.

use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;

use crate::domain::documents::FlatDocument;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_RESOLVER_HIT: &str = "hackhub_cache_resolver_hit_total";
const METRIC_RESOLVER_MISS: &str = "hackhub_cache_resolver_miss_total";
const METRIC_RESOLVER_EVICT: &str = "hackhub_cache_resolver_evict_total";
const METRIC_AGGREGATE_HIT: &str = "hackhub_cache_aggregate_hit_total";
const METRIC_AGGREGATE_MISS: &str = "hackhub_cache_aggregate_miss_total";

// ============================================================================
// Resolver cache
// ============================================================================

/// LRU of resolved documents. Entries are keyed by id only, so two handles
/// pointing at the same id share one entry regardless of collection or instance.
pub struct ResolvedStore {
    enabled: bool,
    entries: RwLock<LruCache<String, FlatDocument>>,
}

impl ResolvedStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            entries: RwLock::new(LruCache::new(config.resolver_limit_non_zero())),
        }
    }

    pub fn get(&self, id: &str) -> Option<FlatDocument> {
        if !self.enabled {
            return None;
        }
        let hit = rw_write(&self.entries, SOURCE, "resolved_get").get(id).cloned();
        match hit {
            Some(_) => counter!(METRIC_RESOLVER_HIT).increment(1),
            None => counter!(METRIC_RESOLVER_MISS).increment(1),
        }
        hit
    }

    /// Store `document` unless `still_current` returns false.
    ///
    /// `still_current` runs while the write lock is held, which orders the
    /// insert against a concurrent `clear`.
    pub fn put_if(
        &self,
        id: String,
        document: FlatDocument,
        still_current: impl FnOnce() -> bool,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut entries = rw_write(&self.entries, SOURCE, "resolved_put");
        if !still_current() {
            return false;
        }
        if let Some((evicted, _)) = entries.push(id.clone(), document) {
            if evicted != id {
                counter!(METRIC_RESOLVER_EVICT).increment(1);
            }
        }
        true
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "resolved_clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "resolved_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Aggregate (TTL) caches
// ============================================================================

#[derive(Clone)]
struct TtlEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Fixed-expiry cache for expensive aggregate views.
pub struct TtlStore<K: Hash + Eq, V: Clone> {
    name: &'static str,
    enabled: bool,
    ttl: Duration,
    entries: RwLock<LruCache<K, TtlEntry<V>>>,
}

impl<K: Hash + Eq, V: Clone> TtlStore<K, V> {
    pub fn new(name: &'static str, ttl: Duration, config: &CacheConfig) -> Self {
        Self {
            name,
            enabled: config.enabled,
            ttl,
            entries: RwLock::new(LruCache::new(config.aggregate_limit_non_zero())),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`; an expired entry is dropped and reported as a miss.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let mut entries = rw_write(&self.entries, SOURCE, "ttl_get");
        let state = entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));
        let hit = match state {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        };
        match hit {
            Some(_) => counter!(METRIC_AGGREGATE_HIT, "cache" => self.name).increment(1),
            None => counter!(METRIC_AGGREGATE_MISS, "cache" => self.name).increment(1),
        }
        hit
    }

    pub fn put_if(&self, key: K, value: V, still_current: impl FnOnce() -> bool) -> bool {
        self.put_at_if(key, value, Instant::now(), still_current)
    }

    pub fn put_at_if(
        &self,
        key: K,
        value: V,
        now: Instant,
        still_current: impl FnOnce() -> bool,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut entries = rw_write(&self.entries, SOURCE, "ttl_put");
        if !still_current() {
            return false;
        }
        entries.put(
            key,
            TtlEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
        true
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "ttl_clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "ttl_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
