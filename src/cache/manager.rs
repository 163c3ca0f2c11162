//! Process-wide cache service.
//!
//! Constructed once at startup and shared through `Arc`. The only way entries
//! leave early is `invalidate_all` (or `invalidate_news` for the news feed);
//! the manager is never rebuilt while requests are in flight.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde_json::Value as Json;
use tracing::info;

use crate::domain::documents::FlatDocument;

use super::config::CacheConfig;
use super::store::{ResolvedStore, TtlStore};

const METRIC_INVALIDATE: &str = "hackhub_cache_invalidate_total";

/// Monotonic invalidation counter.
///
/// Readers capture it before computing a value and only publish the value if
/// no invalidation happened in between.
pub type Epoch = u64;

/// Key of a cached news page: `(limit, single-item id)`.
pub type NewsKey = (usize, Option<String>);

pub struct CacheManager {
    config: CacheConfig,
    epoch: AtomicU64,
    resolved: ResolvedStore,
    hackathons: TtlStore<String, FlatDocument>,
    events: TtlStore<String, Json>,
    news: TtlStore<NewsKey, Vec<FlatDocument>>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            epoch: AtomicU64::new(0),
            resolved: ResolvedStore::new(&config),
            hackathons: TtlStore::new("hackathon", config.hackathon_ttl(), &config),
            events: TtlStore::new("event", config.event_ttl(), &config),
            news: TtlStore::new("news", config.news_ttl(), &config),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch.load(Ordering::Acquire)
    }

    fn is_current(&self, observed: Epoch) -> bool {
        self.epoch() == observed
    }

    // ========================================================================
    // Resolver cache
    // ========================================================================

    pub fn resolved(&self, id: &str) -> Option<FlatDocument> {
        self.resolved.get(id)
    }

    /// Publish a resolved document computed under `observed`.
    pub fn store_resolved(&self, observed: Epoch, document: FlatDocument) -> bool {
        let Some(id) = document.id().map(str::to_string) else {
            return false;
        };
        self.resolved
            .put_if(id, document, || self.is_current(observed))
    }

    pub fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    // ========================================================================
    // Aggregate caches
    // ========================================================================

    pub fn hackathon(&self, id: &str) -> Option<FlatDocument> {
        self.hackathons.get(&id.to_string())
    }

    pub fn store_hackathon(&self, observed: Epoch, id: &str, document: FlatDocument) -> bool {
        self.hackathons
            .put_if(id.to_string(), document, || self.is_current(observed))
    }

    pub fn event(&self, event_id: &str) -> Option<Json> {
        self.events.get(&event_id.to_string())
    }

    pub fn store_event(&self, observed: Epoch, event_id: &str, view: Json) -> bool {
        self.events
            .put_if(event_id.to_string(), view, || self.is_current(observed))
    }

    pub fn news(&self, key: &NewsKey) -> Option<Vec<FlatDocument>> {
        self.news.get(key)
    }

    pub fn store_news(&self, observed: Epoch, key: NewsKey, items: Vec<FlatDocument>) -> bool {
        self.news.put_if(key, items, || self.is_current(observed))
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Drop every cached resolution and aggregate view.
    ///
    /// The epoch is bumped before the stores are cleared so that a reader
    /// finishing concurrently either sees the new epoch and skips its insert,
    /// or inserts before the clear and is wiped by it.
    pub fn invalidate_all(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let resolved = self.resolved.len();
        self.resolved.clear();
        self.hackathons.clear();
        self.events.clear();
        self.news.clear();
        counter!(METRIC_INVALIDATE, "scope" => "all").increment(1);
        info!(epoch, resolved, "Cache invalidated");
    }

    /// Drop cached news pages only.
    pub fn invalidate_news(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.news.clear();
        counter!(METRIC_INVALIDATE, "scope" => "news").increment(1);
        info!("News cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::documents::Fields;

    use super::*;

    fn small_config() -> CacheConfig {
        CacheConfig {
            resolver_limit: 16,
            ..Default::default()
        }
    }

    fn doc(id: &str) -> FlatDocument {
        FlatDocument::from_fields(id, &Fields::new())
    }

    #[test]
    fn invalidate_all_clears_every_store() {
        let cache = CacheManager::new(small_config());
        let epoch = cache.epoch();
        assert!(cache.store_resolved(epoch, doc("t1")));
        assert!(cache.store_hackathon(epoch, "h1", doc("h1")));
        assert!(cache.store_event(epoch, "ev", serde_json::json!({"id": "h1"})));
        assert!(cache.store_news(epoch, (3, None), vec![doc("n1")]));

        cache.invalidate_all();

        assert!(cache.resolved("t1").is_none());
        assert!(cache.hackathon("h1").is_none());
        assert!(cache.event("ev").is_none());
        assert!(cache.news(&(3, None)).is_none());
        assert_eq!(cache.resolved_len(), 0);
    }

    #[test]
    fn values_computed_before_invalidation_are_discarded() {
        let cache = CacheManager::new(small_config());
        let before = cache.epoch();
        cache.invalidate_all();

        assert!(!cache.store_resolved(before, doc("t1")));
        assert!(cache.resolved("t1").is_none());
        assert!(cache.store_resolved(cache.epoch(), doc("t1")));
        assert!(cache.resolved("t1").is_some());
    }

    #[test]
    fn invalidate_news_keeps_resolved_documents() {
        let cache = CacheManager::new(small_config());
        let epoch = cache.epoch();
        cache.store_resolved(epoch, doc("t1"));
        cache.store_news(epoch, (3, None), vec![doc("n1")]);

        cache.invalidate_news();

        assert!(cache.resolved("t1").is_some());
        assert!(cache.news(&(3, None)).is_none());
    }
}
