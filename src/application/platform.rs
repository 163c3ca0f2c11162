//! Rate-limited surface of the core.
//!
//! Every entry point spends one call from its operation's budget before doing
//! any work, then delegates to the resolver, catalog or relationship
//! maintainer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;
use time::Date;

use crate::application::catalog::{Catalog, HackathonWindow};
use crate::application::error::AppError;
use crate::application::ports::{ChannelService, CodeHostService, IdentityService};
use crate::application::relations::{RelationshipMaintainer, TeamCreated, TeamPolicy};
use crate::application::repos::{DocumentStore, Query};
use crate::application::resolver::Resolver;
use crate::cache::CacheManager;
use crate::domain::documents::{DocRef, FlatDocument, Handle, Snapshot, Value};
use crate::domain::payloads::{HackathonDraft, NewsDraft, NonprofitDraft, NonprofitPatch, TeamDraft};
use crate::infra::rate_limit::{Operation, RateLimiter};

/// External collaborators the platform is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub channels: Arc<dyn ChannelService>,
    pub code_host: Arc<dyn CodeHostService>,
    pub identities: Arc<dyn IdentityService>,
    pub policy: TeamPolicy,
}

#[derive(Clone)]
pub struct Platform {
    resolver: Resolver,
    catalog: Catalog,
    relations: RelationshipMaintainer,
    limiter: RateLimiter,
}

impl Platform {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<CacheManager>,
        limiter: RateLimiter,
        collaborators: Collaborators,
    ) -> Self {
        let resolver = Resolver::new(store, cache);
        let relations = RelationshipMaintainer::new(
            resolver.clone(),
            collaborators.channels,
            collaborators.code_host,
            collaborators.identities,
            collaborators.policy,
        );
        Self {
            catalog: Catalog::new(resolver.clone()),
            resolver,
            relations,
            limiter,
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        self.resolver.cache()
    }

    fn spend(&self, operation: Operation) -> Result<(), AppError> {
        self.limiter.check(operation)?;
        Ok(())
    }

    pub async fn resolve(
        &self,
        id: &str,
        handle: Option<&Handle>,
    ) -> Result<Option<FlatDocument>, AppError> {
        self.spend(Operation::Resolve)?;
        Ok(self.resolver.resolve(id, handle).await?)
    }

    pub async fn resolve_recursive(&self, value: &Value) -> Result<Json, AppError> {
        self.spend(Operation::Resolve)?;
        Ok(self.resolver.resolve_recursive(value).await?)
    }

    pub async fn resolve_deep(&self, snapshot: &Snapshot) -> Result<FlatDocument, AppError> {
        self.spend(Operation::Resolve)?;
        Ok(self.resolver.resolve_deep(snapshot).await?)
    }

    pub async fn list_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<FlatDocument>, AppError> {
        self.spend(Operation::ListCollection)?;
        self.catalog.list_collection(collection, query).await
    }

    pub async fn join(&self, user_id: &str, team_id: &str) -> Result<(), AppError> {
        self.spend(Operation::JoinTeam)?;
        self.relations.join(user_id, team_id).await
    }

    pub async fn leave(&self, user_id: &str, team_id: &str) -> Result<(), AppError> {
        self.spend(Operation::LeaveTeam)?;
        self.relations.leave(user_id, team_id).await
    }

    pub async fn create_team(&self, caller: &str, draft: TeamDraft) -> Result<TeamCreated, AppError> {
        self.spend(Operation::CreateTeam)?;
        let spec = draft.validate()?;
        self.relations.create_team_and_link(caller, spec).await
    }

    pub async fn link_problem_statements_to_events(
        &self,
        mapping: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), AppError> {
        self.spend(Operation::LinkProblemStatements)?;
        self.relations.link_problem_statements_to_events(mapping).await
    }

    pub async fn save_nonprofit(&self, draft: NonprofitDraft) -> Result<DocRef, AppError> {
        self.spend(Operation::SaveNonprofit)?;
        self.relations.save_nonprofit(draft.validate()?).await
    }

    pub async fn update_nonprofit(&self, patch: NonprofitPatch) -> Result<(), AppError> {
        self.spend(Operation::UpdateNonprofit)?;
        self.relations.update_nonprofit(patch.validate()?).await
    }

    pub async fn remove_nonprofit(&self, id: &str) -> Result<(), AppError> {
        self.spend(Operation::RemoveNonprofit)?;
        self.relations.remove_nonprofit(id).await
    }

    pub async fn save_hackathon(&self, draft: HackathonDraft) -> Result<DocRef, AppError> {
        self.spend(Operation::SaveHackathon)?;
        self.relations.save_hackathon(draft.validate()?).await
    }

    pub async fn hackathon_by_id(&self, id: &str) -> Result<Option<FlatDocument>, AppError> {
        self.spend(Operation::HackathonById)?;
        self.catalog.hackathon_by_id(id).await
    }

    pub async fn hackathon_event(&self, event_id: &str) -> Result<Option<Json>, AppError> {
        self.spend(Operation::HackathonEvent)?;
        self.catalog.hackathon_event(event_id).await
    }

    pub async fn nonprofit(&self, id: &str) -> Result<Option<FlatDocument>, AppError> {
        self.spend(Operation::Nonprofit)?;
        self.catalog.nonprofit(id).await
    }

    pub async fn list_hackathons(
        &self,
        window: HackathonWindow,
        today: Date,
    ) -> Result<Vec<FlatDocument>, AppError> {
        self.spend(Operation::HackathonList)?;
        self.catalog.list_hackathons(window, today).await
    }

    pub async fn list_teams(&self) -> Result<Vec<FlatDocument>, AppError> {
        self.spend(Operation::TeamList)?;
        self.catalog.list_teams().await
    }

    pub async fn team(&self, id: &str) -> Result<Option<FlatDocument>, AppError> {
        self.spend(Operation::TeamList)?;
        self.catalog.team(id).await
    }

    pub async fn list_nonprofits(&self) -> Result<Vec<FlatDocument>, AppError> {
        self.spend(Operation::NonprofitList)?;
        self.catalog.list_nonprofits().await
    }

    pub async fn news(&self, limit: usize, id: Option<&str>) -> Result<Vec<FlatDocument>, AppError> {
        self.spend(Operation::News)?;
        self.catalog.news(limit, id).await
    }

    pub async fn save_news(&self, draft: NewsDraft) -> Result<DocRef, AppError> {
        self.spend(Operation::SaveNews)?;
        self.catalog.save_news(draft.validate()?).await
    }

    pub fn invalidate_all(&self) {
        self.cache().invalidate_all();
    }
}
