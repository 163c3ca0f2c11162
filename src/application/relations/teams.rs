use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, instrument, warn};

use crate::application::error::AppError;
use crate::application::ports::{Identity, Repository, RepositoryRequest};
use crate::domain::documents::{DocRef, Fields, FlatDocument, Snapshot, Value, collections};
use crate::domain::error::DomainError;
use crate::domain::payloads::TeamSpec;

use super::{RelationshipMaintainer, refs_value, with_ref, without_id};

const MAX_REPOSITORY_NAME: usize = 100;

/// Channel fan-out applied when a team is created.
#[derive(Debug, Clone, Default)]
pub struct TeamPolicy {
    /// Channel receiving a copy of every team welcome message.
    pub audit_channel: String,
    /// Channel-service user ids invited to every new team channel.
    pub admin_ids: Vec<String>,
    /// Prefix for the public project page linked from the welcome message.
    pub project_url_base: String,
}

impl From<&crate::config::ChannelSettings> for TeamPolicy {
    fn from(settings: &crate::config::ChannelSettings) -> Self {
        Self {
            audit_channel: settings.audit_channel.clone(),
            admin_ids: settings.admin_ids.clone(),
            project_url_base: settings.project_url_base.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamCreated {
    pub team: FlatDocument,
    pub repository: Repository,
    pub creator_name: String,
}

impl RelationshipMaintainer {
    #[instrument(skip(self))]
    pub async fn join(&self, user_id: &str, team_id: &str) -> Result<(), AppError> {
        let user_ref = DocRef::new(collections::USERS, user_id);
        let team_ref = DocRef::new(collections::TEAMS, team_id);

        let team = self.require(&team_ref, "team").await?;
        let user = self.require(&user_ref, "user").await?;

        self.invalidating(async {
            let teams = with_ref(user.refs("teams"), team_ref.clone());
            self.merge_field(&user_ref, "teams", teams).await?;

            let users = with_ref(team.refs("users"), user_ref.clone());
            self.merge_field(&team_ref, "users", users).await?;

            info!(user_id, team_id, "User joined team");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn leave(&self, user_id: &str, team_id: &str) -> Result<(), AppError> {
        let team_ref = DocRef::new(collections::TEAMS, team_id);
        let team = self.require(&team_ref, "team").await?;
        let members = team.refs("users");

        self.invalidating(async {
            for member in &members {
                if member.id != user_id {
                    // Other members keep their documents as they are.
                    continue;
                }
                let Some(snapshot) = self.store.get(member).await? else {
                    warn!(member = %member, "Team member document missing");
                    continue;
                };
                let teams = without_id(snapshot.refs("teams"), team_id);
                self.merge_field(member, "teams", refs_value(teams)).await?;
            }

            let remaining = without_id(members, user_id);
            self.merge_field(&team_ref, "users", refs_value(remaining)).await?;

            info!(user_id, team_id, "User left team");
            Ok(())
        })
        .await
    }

    /// Create a team for `spec`, provision its repository and channel, and
    /// link it to the creator and the hackathon.
    ///
    /// Nothing is persisted when the repository cannot be created.
    #[instrument(skip(self, spec), fields(team = %spec.name, event_id = %spec.event_id))]
    pub async fn create_team_and_link(
        &self,
        caller: &str,
        spec: TeamSpec,
    ) -> Result<TeamCreated, AppError> {
        let identity = self
            .identities
            .lookup(caller)
            .await
            .map_err(|err| AppError::external("identity", err))?
            .ok_or_else(|| AppError::not_found("user", caller))?;
        let creator = self.require(&identity.user, "user").await?;

        let statement_ref = DocRef::new(collections::PROBLEM_STATEMENTS, &spec.problem_statement_id);
        let statement = self.require(&statement_ref, "problem statement").await?;
        let hackathon_ref = DocRef::new(collections::HACKATHONS, &spec.event_id);
        let hackathon = self.require(&hackathon_ref, "hackathon").await?;

        let statement_title = required_text(&statement, "title")?;
        let creator_name = required_text(&creator, "name")?;
        let request = RepositoryRequest {
            name: repository_name(&spec.name, &statement_title),
            event_id: hackathon
                .get_str("event_id")
                .unwrap_or(spec.event_id.as_str())
                .to_string(),
            creator_name: creator_name.clone(),
            team_name: spec.name.clone(),
            team_channel: spec.slack_channel.clone(),
            problem_statement_id: spec.problem_statement_id.clone(),
            problem_statement_title: statement_title.clone(),
            github_username: spec.github_username.clone(),
        };
        let repository = self
            .code_host
            .create_repository(&request)
            .await
            .map_err(|err| AppError::external("code host", err))?;
        info!(repository = %repository.full_url, "Created team repository");

        self.provision_channel(&spec, &identity, &statement_title, &repository)
            .await;

        let team_fields = team_document(&spec, &identity, &statement_ref, &repository)?;
        let team_ref = self
            .invalidating(async {
                let team_ref = self.store.add(collections::TEAMS, team_fields).await?;

                let creator_teams = with_ref(creator.refs("teams"), team_ref.clone());
                self.merge_field(&identity.user, "teams", creator_teams).await?;
                self.append_to_hackathon(&hackathon, team_ref.clone()).await?;

                info!(
                    team_id = %team_ref.id,
                    problem_statement_id = %spec.problem_statement_id,
                    user_id = %identity.user.id,
                    "Team created; clearing caches"
                );
                Ok(team_ref)
            })
            .await?;

        let team = self
            .resolver
            .resolve_ref(&team_ref)
            .await?
            .ok_or_else(|| AppError::unexpected(format!("team `{team_ref}` vanished after insert")))?;

        Ok(TeamCreated {
            team,
            repository,
            creator_name,
        })
    }

    async fn provision_channel(
        &self,
        spec: &TeamSpec,
        identity: &Identity,
        statement_title: &str,
        repository: &Repository,
    ) {
        let channel = spec.slack_channel.as_str();
        if let Err(err) = self.channels.create_channel(channel).await {
            // An existing channel is reused.
            warn!(channel, error = %err, "Channel creation failed");
        }
        self.channels
            .invite_member(&identity.channel_user_id, channel)
            .await;
        for admin in &self.policy.admin_ids {
            self.channels.invite_member(admin, channel).await;
        }

        let message = format!(
            "Team `{}` | `#{}` has been created in support of project `{}` {}/{} by <@{}>.\n\nRepository: {}",
            spec.name,
            channel,
            statement_title,
            self.policy.project_url_base.trim_end_matches('/'),
            spec.problem_statement_id,
            identity.channel_user_id,
            repository.full_url,
        );
        self.channels.post_message(&message, channel).await;
        if !self.policy.audit_channel.is_empty() {
            self.channels
                .post_message(&message, &self.policy.audit_channel)
                .await;
        }
        debug!(channel, "Team channel provisioned");
    }

    async fn append_to_hackathon(&self, hackathon: &Snapshot, team: DocRef) -> Result<(), AppError> {
        let teams = with_ref(hackathon.refs("teams"), team);
        self.merge_field(&hackathon.reference, "teams", teams).await
    }
}

fn required_text(snapshot: &Snapshot, field: &'static str) -> Result<String, DomainError> {
    snapshot
        .get_str(field)
        .map(str::to_string)
        .ok_or_else(|| DomainError::missing_field(&snapshot.reference, field))
}

/// `"<team>--<title>"` with spaces and dashes removed from the title, capped
/// at the code host's name limit.
fn repository_name(team: &str, statement_title: &str) -> String {
    let title: String = statement_title
        .chars()
        .filter(|ch| *ch != ' ' && *ch != '-')
        .collect();
    format!("{team}--{title}")
        .chars()
        .take(MAX_REPOSITORY_NAME)
        .collect()
}

fn team_document(
    spec: &TeamSpec,
    identity: &Identity,
    statement: &DocRef,
    repository: &Repository,
) -> Result<Fields, AppError> {
    let created = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::unexpected(format!("failed to format timestamp: {err}")))?;

    let mut link = Fields::new();
    link.insert("link".into(), Value::text(&repository.full_url));
    link.insert("name".into(), Value::text(&repository.name));

    let mut fields = Fields::new();
    fields.insert("team_number".into(), Value::Int(-1));
    fields.insert("users".into(), Value::List(vec![Value::Ref(identity.user.clone())]));
    fields.insert(
        "problem_statements".into(),
        Value::List(vec![Value::Ref(statement.clone())]),
    );
    fields.insert("name".into(), Value::text(&spec.name));
    fields.insert("slack_channel".into(), Value::text(&spec.slack_channel));
    fields.insert("created".into(), Value::text(created));
    fields.insert("active".into(), Value::text("True"));
    fields.insert("github_links".into(), Value::List(vec![Value::Map(link)]));
    Ok(fields)
}
