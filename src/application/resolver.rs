//! Reference Resolver.
//!
//! Turns handles and snapshots into flat, client-consumable documents.
//! `resolve` is the shallow path: references inside the document render as
//! bare ids. `resolve_recursive` and `resolve_deep` are the deep path used by
//! top-level aggregate views, where each referenced document appears as a
//! nested (itself shallow) object.

use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{debug, instrument, warn};

use crate::application::repos::{DocumentStore, Query, RepoError};
use crate::cache::{CacheManager, Epoch};
use crate::domain::documents::{DocRef, FlatDocument, Handle, Snapshot, Value};

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn DocumentStore>,
    cache: Arc<CacheManager>,
}

impl Resolver {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<CacheManager>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Resolve `handle` into a flat document whose `id` is `id`.
    ///
    /// Absent input, an empty id, or a document missing from the store all
    /// yield `Ok(None)`. Results are memoised by id only; a caller-supplied
    /// snapshot is flattened but never memoised, since its read time is unknown.
    #[instrument(skip(self, handle))]
    pub async fn resolve(
        &self,
        id: &str,
        handle: Option<&Handle>,
    ) -> Result<Option<FlatDocument>, RepoError> {
        if id.is_empty() {
            debug!("Empty document id");
            return Ok(None);
        }
        let Some(handle) = handle else {
            debug!("No handle supplied");
            return Ok(None);
        };

        match handle {
            Handle::Resolved(snapshot) => Ok(Some(self.flatten(id, snapshot, None))),
            Handle::Unresolved(reference) => self.fetch(id, reference).await,
        }
    }

    pub async fn resolve_handle(&self, handle: &Handle) -> Result<Option<FlatDocument>, RepoError> {
        self.resolve(handle.id(), Some(handle)).await
    }

    pub async fn resolve_ref(&self, reference: &DocRef) -> Result<Option<FlatDocument>, RepoError> {
        self.fetch(&reference.id, reference).await
    }

    /// Deep path over a single value.
    ///
    /// References become nested documents (`null` when missing), lists have
    /// their reference elements dereferenced, everything else passes through.
    pub async fn resolve_recursive(&self, value: &Value) -> Result<Json, RepoError> {
        match value {
            Value::Ref(reference) => self.nested(reference).await,
            Value::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    let json = match item {
                        Value::Ref(reference) => self.nested(reference).await?,
                        other => other.to_flat_json(),
                    };
                    resolved.push(json);
                }
                Ok(Json::Array(resolved))
            }
            other => Ok(other.to_flat_json()),
        }
    }

    /// Shallow-resolve `snapshot`, then expand every reference-bearing field
    /// one level through [`Resolver::resolve_recursive`].
    ///
    /// The top-level document is not memoised; use [`Resolver::list_deep`]
    /// for reads that should fill the cache.
    pub async fn resolve_deep(&self, snapshot: &Snapshot) -> Result<FlatDocument, RepoError> {
        self.deep(snapshot, None).await
    }

    /// Flatten a snapshot read from the store after `observed` was taken.
    pub fn flatten_read(&self, snapshot: &Snapshot, observed: Epoch) -> FlatDocument {
        self.flatten(snapshot.id(), snapshot, Some(observed))
    }

    async fn deep(
        &self,
        snapshot: &Snapshot,
        observed: Option<Epoch>,
    ) -> Result<FlatDocument, RepoError> {
        let mut flat = self.flatten(snapshot.id(), snapshot, observed);
        for (field, value) in &snapshot.fields {
            if field == "id" || !value.holds_refs() {
                continue;
            }
            let expanded = self.resolve_recursive(value).await?;
            flat.insert(field.clone(), expanded);
        }
        Ok(flat)
    }

    /// Shallow listing of a collection.
    pub async fn list(&self, collection: &str, query: &Query) -> Result<Vec<FlatDocument>, RepoError> {
        let epoch = self.cache.epoch();
        let snapshots = self.store.query(collection, query).await?;
        Ok(snapshots
            .iter()
            .map(|snapshot| self.flatten_read(snapshot, epoch))
            .collect())
    }

    /// Deep listing of a collection, for aggregate pages.
    pub async fn list_deep(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<FlatDocument>, RepoError> {
        let epoch = self.cache.epoch();
        let snapshots = self.store.query(collection, query).await?;
        let mut results = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            results.push(self.deep(snapshot, Some(epoch)).await?);
        }
        Ok(results)
    }

    async fn nested(&self, reference: &DocRef) -> Result<Json, RepoError> {
        Ok(self
            .resolve_ref(reference)
            .await?
            .map_or(Json::Null, FlatDocument::into_json))
    }

    /// `observed` is the epoch taken before `snapshot` was read; without one
    /// the result is not memoised.
    fn flatten(&self, id: &str, snapshot: &Snapshot, observed: Option<Epoch>) -> FlatDocument {
        if let Some(hit) = self.cache.resolved(id) {
            return hit;
        }
        let document = FlatDocument::from_fields(id, &snapshot.fields);
        if let Some(epoch) = observed {
            self.cache.store_resolved(epoch, document.clone());
        }
        document
    }

    async fn fetch(&self, id: &str, reference: &DocRef) -> Result<Option<FlatDocument>, RepoError> {
        if let Some(hit) = self.cache.resolved(id) {
            return Ok(Some(hit));
        }
        let epoch = self.cache.epoch();
        let Some(snapshot) = self.store.get(reference).await? else {
            warn!(document = %reference, "Referenced document not found");
            return Ok(None);
        };
        let document = FlatDocument::from_fields(id, &snapshot.fields);
        self.cache.store_resolved(epoch, document.clone());
        Ok(Some(document))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::cache::CacheConfig;
    use crate::domain::documents::{Fields, collections};
    use crate::infra::store::MemoryStore;

    use super::*;

    /// Counts `get` calls reaching the wrapped store.
    struct CountingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn get(&self, reference: &DocRef) -> Result<Option<Snapshot>, RepoError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(reference).await
        }

        async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, RepoError> {
            self.inner.query(collection, query).await
        }

        async fn add(&self, collection: &str, fields: Fields) -> Result<DocRef, RepoError> {
            self.inner.add(collection, fields).await
        }

        async fn set(&self, reference: &DocRef, fields: Fields, merge: bool) -> Result<(), RepoError> {
            self.inner.set(reference, fields, merge).await
        }

        async fn update(&self, reference: &DocRef, fields: Fields) -> Result<(), RepoError> {
            self.inner.update(reference, fields).await
        }

        async fn delete(&self, reference: &DocRef) -> Result<(), RepoError> {
            self.inner.delete(reference).await
        }
    }

    /// Simulates a writer that renames `teams/t1` and invalidates the cache
    /// right after a listing has read its snapshots.
    struct InterleavedWriter {
        inner: MemoryStore,
        cache: Arc<CacheManager>,
    }

    #[async_trait]
    impl DocumentStore for InterleavedWriter {
        async fn get(&self, reference: &DocRef) -> Result<Option<Snapshot>, RepoError> {
            self.inner.get(reference).await
        }

        async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, RepoError> {
            let snapshots = self.inner.query(collection, query).await?;
            let mut patch = Fields::new();
            patch.insert("name".into(), Value::text("Renamed"));
            self.inner
                .set(&DocRef::new(collections::TEAMS, "t1"), patch, true)
                .await?;
            self.cache.invalidate_all();
            Ok(snapshots)
        }

        async fn add(&self, collection: &str, fields: Fields) -> Result<DocRef, RepoError> {
            self.inner.add(collection, fields).await
        }

        async fn set(&self, reference: &DocRef, fields: Fields, merge: bool) -> Result<(), RepoError> {
            self.inner.set(reference, fields, merge).await
        }

        async fn update(&self, reference: &DocRef, fields: Fields) -> Result<(), RepoError> {
            self.inner.update(reference, fields).await
        }

        async fn delete(&self, reference: &DocRef) -> Result<(), RepoError> {
            self.inner.delete(reference).await
        }
    }

    fn interleaved() -> Resolver {
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let inner = MemoryStore::from_seed(json!({
            "teams": {"t1": {"name": "Crabs", "users": []}}
        }))
        .expect("valid seed");
        let store = Arc::new(InterleavedWriter {
            inner,
            cache: cache.clone(),
        });
        Resolver::new(store, cache)
    }

    fn fixture() -> (Resolver, Arc<CountingStore>) {
        let inner = MemoryStore::from_seed(json!({
            "teams": {
                "t1": {
                    "name": "Crabs",
                    "users": [{"$ref": "users/u1"}, {"$ref": "users/u2"}],
                    "problem_statements": [{"$ref": "problem_statements/ps1"}]
                }
            },
            "users": {
                "u1": {"name": "Ada", "teams": [{"$ref": "teams/t1"}]},
                "u2": {"name": "Grace", "teams": [{"$ref": "teams/t1"}]}
            },
            "problem_statements": {
                "ps1": {"title": "Food bank routing", "events": [{"$ref": "hackathons/h1"}]}
            }
        }))
        .expect("valid seed");
        let store = Arc::new(CountingStore {
            inner,
            gets: AtomicUsize::new(0),
        });
        let cache = Arc::new(CacheManager::new(CacheConfig {
            resolver_limit: 64,
            ..Default::default()
        }));
        (Resolver::new(store.clone(), cache), store)
    }

    fn team_ref() -> DocRef {
        DocRef::new(collections::TEAMS, "t1")
    }

    #[tokio::test]
    async fn resolve_sets_id_and_flattens_reference_lists() {
        let (resolver, _) = fixture();
        let handle = Handle::Unresolved(team_ref());

        let team = resolver
            .resolve("t1", Some(&handle))
            .await
            .expect("store ok")
            .expect("team exists");

        assert_eq!(team.id(), Some("t1"));
        assert_eq!(team.get("users"), Some(&json!(["u1", "u2"])));
        assert_eq!(team.get("problem_statements"), Some(&json!(["ps1"])));
    }

    #[tokio::test]
    async fn absent_input_yields_empty_result() {
        let (resolver, store) = fixture();
        assert!(resolver.resolve("t1", None).await.expect("no error").is_none());
        assert!(
            resolver
                .resolve("", Some(&Handle::Unresolved(team_ref())))
                .await
                .expect("no error")
                .is_none()
        );
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn memoises_by_id_across_handle_instances() {
        let (resolver, store) = fixture();
        let first = resolver
            .resolve_handle(&Handle::Unresolved(team_ref()))
            .await
            .expect("ok");
        let second = resolver
            .resolve_handle(&Handle::Unresolved(team_ref()))
            .await
            .expect("ok");

        assert_eq!(first, second);
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_documents_are_not_cached() {
        let (resolver, store) = fixture();
        let missing = DocRef::new(collections::TEAMS, "ghost");

        assert!(resolver.resolve_ref(&missing).await.expect("ok").is_none());
        assert!(resolver.resolve_ref(&missing).await.expect("ok").is_none());
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resolved_snapshots_skip_the_store() {
        let (resolver, store) = fixture();
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::text("Inline"));
        let snapshot = Snapshot::new(DocRef::new(collections::TEAMS, "inline"), fields);

        let flat = resolver
            .resolve_handle(&Handle::Resolved(snapshot))
            .await
            .expect("ok")
            .expect("resolved");
        assert_eq!(flat.id(), Some("inline"));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolve_recursive_nests_documents_and_is_repeatable() {
        let (resolver, _) = fixture();
        let members = Value::List(vec![
            Value::Ref(DocRef::new(collections::USERS, "u1")),
            Value::Ref(DocRef::new(collections::USERS, "u2")),
        ]);

        let first = resolver.resolve_recursive(&members).await.expect("ok");
        let second = resolver.resolve_recursive(&members).await.expect("ok");

        assert_eq!(first, second);
        assert_eq!(first[0]["id"], json!("u1"));
        assert_eq!(first[0]["teams"], json!(["t1"]));
        assert_eq!(first[1]["name"], json!("Grace"));
    }

    #[tokio::test]
    async fn resolve_recursive_passes_plain_values_through() {
        let (resolver, _) = fixture();
        assert_eq!(
            resolver.resolve_recursive(&Value::Int(7)).await.expect("ok"),
            json!(7)
        );
        let mut inner = Fields::new();
        inner.insert("link".into(), Value::text("https://example.org"));
        assert_eq!(
            resolver.resolve_recursive(&Value::Map(inner)).await.expect("ok"),
            json!({"link": "https://example.org"})
        );
    }

    #[tokio::test]
    async fn resolve_deep_expands_one_level() {
        let (resolver, _) = fixture();
        let snapshot = resolver
            .store()
            .get(&team_ref())
            .await
            .expect("ok")
            .expect("team");

        let deep = resolver.resolve_deep(&snapshot).await.expect("ok");

        assert_eq!(deep.get("name"), Some(&json!("Crabs")));
        let statements = deep.get("problem_statements").expect("expanded");
        assert_eq!(statements[0]["title"], json!("Food bank routing"));
        // Second level stays shallow.
        assert_eq!(statements[0]["events"], json!(["h1"]));
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_read() {
        let (resolver, store) = fixture();
        resolver.resolve_ref(&team_ref()).await.expect("ok");

        let mut patch = Fields::new();
        patch.insert("name".into(), Value::text("Renamed"));
        store.set(&team_ref(), patch, true).await.expect("set");

        let stale = resolver.resolve_ref(&team_ref()).await.expect("ok").expect("team");
        assert_eq!(stale.get("name"), Some(&json!("Crabs")));

        resolver.cache().invalidate_all();
        let fresh = resolver.resolve_ref(&team_ref()).await.expect("ok").expect("team");
        assert_eq!(fresh.get("name"), Some(&json!("Renamed")));
    }

    #[tokio::test]
    async fn listing_does_not_cache_reads_overtaken_by_invalidation() {
        let resolver = interleaved();
        let listed = resolver.list(collections::TEAMS, &Query::new()).await.expect("ok");
        assert_eq!(listed[0].get("name"), Some(&json!("Crabs")));

        let team = resolver.resolve_ref(&team_ref()).await.expect("ok").expect("team");
        assert_eq!(team.get("name"), Some(&json!("Renamed")));
    }

    #[tokio::test]
    async fn deep_listing_does_not_cache_reads_overtaken_by_invalidation() {
        let resolver = interleaved();
        resolver
            .list_deep(collections::TEAMS, &Query::new())
            .await
            .expect("ok");

        let team = resolver.resolve_ref(&team_ref()).await.expect("ok").expect("team");
        assert_eq!(team.get("name"), Some(&json!("Renamed")));
    }

    #[tokio::test]
    async fn caller_snapshots_are_not_memoised() {
        let (resolver, store) = fixture();
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::text("Outdated"));
        let snapshot = Snapshot::new(team_ref(), fields);
        resolver
            .resolve_handle(&Handle::Resolved(snapshot))
            .await
            .expect("ok");

        let team = resolver.resolve_ref(&team_ref()).await.expect("ok").expect("team");
        assert_eq!(team.get("name"), Some(&json!("Crabs")));
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    }
}
