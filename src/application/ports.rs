//! External collaborators consumed by the relationship layer.
//!
//! Only the narrow contracts are modelled here. Channel operations other than
//! creation are fire-and-forget: implementations log their own failures.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::documents::DocRef;

#[derive(Debug, Error)]
pub enum ExternalError {
    /// The collaborator refused the request; the message is safe to show users.
    #[error("{0}")]
    Rejected(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ChannelService: Send + Sync {
    async fn create_channel(&self, name: &str) -> Result<(), ExternalError>;

    async fn invite_member(&self, user_id: &str, channel: &str);

    async fn post_message(&self, text: &str, channel: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRequest {
    pub name: String,
    pub event_id: String,
    pub creator_name: String,
    pub team_name: String,
    pub team_channel: String,
    pub problem_statement_id: String,
    pub problem_statement_title: String,
    pub github_username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub full_url: String,
}

#[async_trait]
pub trait CodeHostService: Send + Sync {
    async fn create_repository(
        &self,
        request: &RepositoryRequest,
    ) -> Result<Repository, ExternalError>;
}

/// Internal user record an external caller maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: DocRef,
    /// Id used by the channel service for invitations and mentions.
    pub channel_user_id: String,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn lookup(&self, caller: &str) -> Result<Option<Identity>, ExternalError>;
}
