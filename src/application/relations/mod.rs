//! Relationship Maintainer.
//!
//! Keeps both sides of the many-to-many links between users, teams, problem
//! statements, nonprofits and hackathons consistent. Every multi-document
//! operation is a sequence of independent writes: there is no transaction
//! and no rollback, so concurrent read-modify-write calls against the same
//! document are last-writer-wins. Every operation that has started writing
//! clears every cache before returning, whether or not it succeeded.

mod hackathons;
mod links;
mod nonprofits;
mod teams;

use std::sync::Arc;

use tracing::warn;

use crate::application::error::AppError;
use crate::application::ports::{ChannelService, CodeHostService, IdentityService};
use crate::application::repos::DocumentStore;
use crate::application::resolver::Resolver;
use crate::cache::CacheManager;
use crate::domain::documents::{DocRef, Fields, Snapshot, Value};

pub use teams::{TeamCreated, TeamPolicy};

#[derive(Clone)]
pub struct RelationshipMaintainer {
    store: Arc<dyn DocumentStore>,
    resolver: Resolver,
    cache: Arc<CacheManager>,
    channels: Arc<dyn ChannelService>,
    code_host: Arc<dyn CodeHostService>,
    identities: Arc<dyn IdentityService>,
    policy: TeamPolicy,
}

impl RelationshipMaintainer {
    pub fn new(
        resolver: Resolver,
        channels: Arc<dyn ChannelService>,
        code_host: Arc<dyn CodeHostService>,
        identities: Arc<dyn IdentityService>,
        policy: TeamPolicy,
    ) -> Self {
        Self {
            store: resolver.store().clone(),
            cache: resolver.cache().clone(),
            resolver,
            channels,
            code_host,
            identities,
            policy,
        }
    }

    async fn require(&self, reference: &DocRef, entity: &'static str) -> Result<Snapshot, AppError> {
        match self.store.get(reference).await? {
            Some(snapshot) => Ok(snapshot),
            None => {
                warn!(document = %reference, entity, "Required document not found");
                Err(AppError::not_found(entity, reference.id.clone()))
            }
        }
    }

    /// Run a sequence of writes, then clear every cache. Writes persisted
    /// before a failure stay persisted, so the caches are cleared either way.
    async fn invalidating<T>(
        &self,
        writes: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        let outcome = writes.await;
        self.cache.invalidate_all();
        outcome
    }

    async fn merge_field(&self, reference: &DocRef, field: &str, value: Value) -> Result<(), AppError> {
        let mut fields = Fields::new();
        fields.insert(field.to_string(), value);
        self.store.set(reference, fields, true).await?;
        Ok(())
    }
}

/// `existing` plus `addition`, with duplicate ids collapsed to their first
/// occurrence.
fn with_ref(existing: Vec<DocRef>, addition: DocRef) -> Value {
    let mut refs: Vec<DocRef> = Vec::with_capacity(existing.len() + 1);
    for reference in existing.into_iter().chain(std::iter::once(addition)) {
        if refs.iter().any(|seen| seen.id == reference.id) {
            continue;
        }
        refs.push(reference);
    }
    refs_value(refs)
}

fn without_id(existing: Vec<DocRef>, id: &str) -> Vec<DocRef> {
    existing.into_iter().filter(|reference| reference.id != id).collect()
}

fn refs_value(refs: Vec<DocRef>) -> Value {
    Value::List(refs.into_iter().map(Value::Ref).collect())
}

fn refs_from_ids(collection: &str, ids: &[String]) -> Value {
    let refs: Vec<DocRef> = ids
        .iter()
        .filter(|id| {
            let keep = !id.trim().is_empty();
            if !keep {
                warn!(collection, "Skipping empty id in reference list");
            }
            keep
        })
        .map(|id| DocRef::new(collection, id.trim()))
        .collect();
    refs_value(refs)
}
