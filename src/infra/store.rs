//! In-process document store.
//!
//! Backs the CLI (seeded from a JSON file) and the test suites. Documents are
//! kept per collection; every operation takes the lock only for its own
//! critical section, so concurrent read-modify-write sequences interleave the
//! same way they would against a remote store.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{Direction, DocumentStore, Query, RepoError, compare_values};
use crate::domain::documents::{DocRef, Fields, Snapshot, Value};

use super::error::InfraError;

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = (DocRef, Fields)>) -> Self {
        let mut collections = Collections::new();
        for (reference, fields) in documents {
            collections
                .entry(reference.collection)
                .or_default()
                .insert(reference.id, fields);
        }
        Self {
            collections: RwLock::new(collections),
            latency: None,
        }
    }

    /// Delay every operation, widening the window between a read and the
    /// write that follows it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Build from the seed format `{"<collection>": {"<id>": {<fields>}}}`.
    pub fn from_seed(seed: Json) -> Result<Self, InfraError> {
        let Json::Object(collections) = seed else {
            return Err(InfraError::seed("top level must be an object of collections"));
        };
        let mut documents = Vec::new();
        for (collection, docs) in collections {
            let Json::Object(docs) = docs else {
                return Err(InfraError::seed(format!(
                    "collection `{collection}` must be an object keyed by id"
                )));
            };
            for (id, fields) in docs {
                let Value::Map(fields) = Value::from_seed_json(fields) else {
                    return Err(InfraError::seed(format!(
                        "document `{collection}/{id}` must be an object"
                    )));
                };
                documents.push((DocRef::new(collection.clone(), id), fields));
            }
        }
        Ok(Self::from_documents(documents))
    }

    pub async fn to_seed(&self) -> Json {
        let collections = self.collections.read().await;
        let object: Map<String, Json> = collections
            .iter()
            .map(|(collection, docs)| {
                let docs: Map<String, Json> = docs
                    .iter()
                    .map(|(id, fields)| (id.clone(), Value::Map(fields.clone()).to_seed_json()))
                    .collect();
                (collection.clone(), Json::Object(docs))
            })
            .collect();
        Json::Object(object)
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read(path).await?;
        let seed: Json = serde_json::from_slice(&raw)
            .map_err(|err| InfraError::seed(format!("{}: {err}", path.display())))?;
        Self::from_seed(seed)
    }

    pub async fn save(&self, path: &Path) -> Result<(), InfraError> {
        let seed = self.to_seed().await;
        let body = serde_json::to_vec_pretty(&seed)
            .map_err(|err| InfraError::seed(format!("failed to encode store: {err}")))?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, reference: &DocRef) -> Result<Option<Snapshot>, RepoError> {
        self.pause().await;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&reference.collection)
            .and_then(|docs| docs.get(&reference.id))
            .map(|fields| Snapshot::new(reference.clone(), fields.clone())))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>, RepoError> {
        self.pause().await;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<Snapshot> = docs
            .iter()
            .filter(|(_, fields)| query.filters.iter().all(|filter| filter.matches(fields)))
            .map(|(id, fields)| Snapshot::new(DocRef::new(collection, id.clone()), fields.clone()))
            .collect();

        if let Some(order) = &query.order_by {
            // Documents without the ordering field are excluded, as in the hosted store.
            matches.retain(|snapshot| snapshot.get(&order.field).is_some());
            matches.sort_by(|left, right| {
                let ordering = match (left.get(&order.field), right.get(&order.field)) {
                    (Some(a), Some(b)) => compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal),
                    _ => std::cmp::Ordering::Equal,
                };
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        debug!(collection, results = matches.len(), "Memory store query");
        Ok(matches)
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocRef, RepoError> {
        self.pause().await;
        let reference = DocRef::new(collection, Uuid::new_v4().simple().to_string());
        self.collections
            .write()
            .await
            .entry(reference.collection.clone())
            .or_default()
            .insert(reference.id.clone(), fields);
        Ok(reference)
    }

    async fn set(&self, reference: &DocRef, fields: Fields, merge: bool) -> Result<(), RepoError> {
        self.pause().await;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(reference.collection.clone()).or_default();
        if merge {
            if let Some(existing) = docs.get_mut(&reference.id) {
                existing.extend(fields);
                return Ok(());
            }
        }
        docs.insert(reference.id.clone(), fields);
        Ok(())
    }

    async fn update(&self, reference: &DocRef, fields: Fields) -> Result<(), RepoError> {
        self.pause().await;
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(&reference.collection)
            .and_then(|docs| docs.get_mut(&reference.id))
            .ok_or_else(|| RepoError::NotFound(reference.clone()))?;
        existing.extend(fields);
        Ok(())
    }

    async fn delete(&self, reference: &DocRef) -> Result<(), RepoError> {
        self.pause().await;
        if let Some(docs) = self.collections.write().await.get_mut(&reference.collection) {
            docs.remove(&reference.id);
        }
        Ok(())
    }
}
