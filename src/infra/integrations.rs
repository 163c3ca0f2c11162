//! Local stand-ins for the external collaborators.
//!
//! They let the CLI and tests run without chat or code-hosting credentials:
//! channel traffic is written to the log and repositories are named but
//! never created.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::application::ports::{
    ChannelService, CodeHostService, ExternalError, Identity, IdentityService, Repository,
    RepositoryRequest,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingChannelService;

#[async_trait]
impl ChannelService for LoggingChannelService {
    async fn create_channel(&self, name: &str) -> Result<(), ExternalError> {
        info!(target: "hackhub::channels", channel = name, "create channel");
        Ok(())
    }

    async fn invite_member(&self, user_id: &str, channel: &str) {
        info!(target: "hackhub::channels", user_id, channel, "invite member");
    }

    async fn post_message(&self, text: &str, channel: &str) {
        info!(target: "hackhub::channels", channel, chars = text.chars().count(), "post message");
    }
}

/// Names repositories under a fixed base URL without contacting any host.
#[derive(Debug, Clone)]
pub struct LoggingCodeHost {
    base_url: String,
}

impl LoggingCodeHost {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CodeHostService for LoggingCodeHost {
    async fn create_repository(
        &self,
        request: &RepositoryRequest,
    ) -> Result<Repository, ExternalError> {
        if request.name.is_empty() {
            return Err(ExternalError::Rejected("repository name is empty".into()));
        }
        let full_url = format!("{}/{}", self.base_url.trim_end_matches('/'), request.name);
        info!(
            target: "hackhub::code_host",
            repository = %request.name,
            event_id = %request.event_id,
            "create repository"
        );
        Ok(Repository {
            name: request.name.clone(),
            full_url,
        })
    }
}

/// In-memory caller → user mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityDirectory {
    identities: HashMap<String, Identity>,
}

impl StaticIdentityDirectory {
    pub fn insert(&mut self, caller: impl Into<String>, identity: Identity) {
        self.identities.insert(caller.into(), identity);
    }
}

impl FromIterator<(String, Identity)> for StaticIdentityDirectory {
    fn from_iter<I: IntoIterator<Item = (String, Identity)>>(iter: I) -> Self {
        Self {
            identities: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityService for StaticIdentityDirectory {
    async fn lookup(&self, caller: &str) -> Result<Option<Identity>, ExternalError> {
        Ok(self.identities.get(caller).cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::documents::DocRef;

    use super::*;

    #[tokio::test]
    async fn code_host_builds_url_from_base() {
        let host = LoggingCodeHost::new("https://code.example/org/");
        let repository = host
            .create_repository(&RepositoryRequest {
                name: "Crabs--Routing".into(),
                event_id: "2024_fall".into(),
                creator_name: "Ada".into(),
                team_name: "Crabs".into(),
                team_channel: "crabs".into(),
                problem_statement_id: "ps1".into(),
                problem_statement_title: "Routing".into(),
                github_username: "ada".into(),
            })
            .await
            .expect("created");
        assert_eq!(repository.full_url, "https://code.example/org/Crabs--Routing");
    }

    #[tokio::test]
    async fn identity_directory_lookup() {
        let mut directory = StaticIdentityDirectory::default();
        directory.insert(
            "oauth|ada",
            Identity {
                user: DocRef::new("users", "u1"),
                channel_user_id: "UADA".into(),
            },
        );
        let found = directory.lookup("oauth|ada").await.expect("ok").expect("known");
        assert_eq!(found.user.id, "u1");
        assert!(directory.lookup("oauth|nobody").await.expect("ok").is_none());
    }
}
