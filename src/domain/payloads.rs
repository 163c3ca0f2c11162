//! Inbound payloads for write operations and their validation.
//!
//! Payloads arrive with every field optional; `validate` turns them into
//! fully-populated commands or a [`DomainError::Validation`] naming the first
//! missing field. Nothing is persisted for a payload that fails validation.

use serde::Deserialize;

use super::error::DomainError;

fn require(value: Option<String>, field: &'static str) -> Result<String, DomainError> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| DomainError::validation(format!("missing field `{field}`")))
}

fn require_list(value: Option<Vec<String>>, field: &'static str) -> Result<Vec<String>, DomainError> {
    value.ok_or_else(|| DomainError::validation(format!("missing field `{field}`")))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDraft {
    pub name: Option<String>,
    pub event_id: Option<String>,
    pub slack_channel: Option<String>,
    pub problem_statement_id: Option<String>,
    pub github_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSpec {
    pub name: String,
    pub event_id: String,
    pub slack_channel: String,
    pub problem_statement_id: String,
    pub github_username: String,
}

impl TeamDraft {
    pub fn validate(self) -> Result<TeamSpec, DomainError> {
        Ok(TeamSpec {
            name: require(self.name, "name")?,
            event_id: require(self.event_id, "eventId")?,
            slack_channel: require(self.slack_channel, "slackChannel")?,
            problem_statement_id: require(self.problem_statement_id, "problemStatementId")?,
            github_username: require(self.github_username, "githubUsername")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NonprofitDraft {
    /// Contact person.
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "npoName")]
    pub npo_name: Option<String>,
    pub slack_channel: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub problem_statements: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNonprofit {
    pub contact_name: String,
    pub contact_email: String,
    pub name: String,
    pub slack_channel: String,
    pub website: String,
    pub description: String,
    pub problem_statement_ids: Vec<String>,
}

impl NonprofitDraft {
    pub fn validate(self) -> Result<NewNonprofit, DomainError> {
        Ok(NewNonprofit {
            contact_name: require(self.name, "name")?,
            contact_email: require(self.email, "email")?,
            name: require(self.npo_name, "npoName")?,
            slack_channel: require(self.slack_channel, "slack_channel")?,
            website: require(self.website, "website")?,
            description: require(self.description, "description")?,
            problem_statement_ids: require_list(self.problem_statements, "problem_statements")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NonprofitPatch {
    pub id: Option<String>,
    pub problem_statements: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonprofitUpdate {
    pub id: String,
    pub problem_statement_ids: Vec<String>,
}

impl NonprofitPatch {
    pub fn validate(self) -> Result<NonprofitUpdate, DomainError> {
        Ok(NonprofitUpdate {
            id: require(self.id, "id")?,
            problem_statement_ids: require_list(self.problem_statements, "problem_statements")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HackathonDraft {
    pub event_id: Option<String>,
    pub devpost_url: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub event_type: Option<String>,
    pub image_url: Option<String>,
    pub nonprofits: Option<Vec<String>>,
    pub teams: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHackathon {
    pub event_id: Option<String>,
    pub devpost_url: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub event_type: String,
    pub image_url: String,
    pub nonprofit_ids: Vec<String>,
    pub team_ids: Vec<String>,
}

impl HackathonDraft {
    pub fn validate(self) -> Result<NewHackathon, DomainError> {
        Ok(NewHackathon {
            event_id: self
                .event_id
                .map(|raw| raw.trim().to_string())
                .filter(|trimmed| !trimmed.is_empty()),
            devpost_url: require(self.devpost_url, "devpost_url")?,
            location: require(self.location, "location")?,
            start_date: require(self.start_date, "start_date")?,
            end_date: require(self.end_date, "end_date")?,
            event_type: require(self.event_type, "event_type")?,
            image_url: require(self.image_url, "image_url")?,
            nonprofit_ids: require_list(self.nonprofits, "nonprofits")?,
            team_ids: require_list(self.teams, "teams")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub slack_ts: Option<String>,
    pub slack_permalink: Option<String>,
    pub slack_channel: Option<String>,
    #[serde(default)]
    pub links: Vec<NewsLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewsLink {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub slack_ts: String,
    pub slack_permalink: String,
    pub slack_channel: String,
    pub links: Vec<NewsLink>,
}

impl NewsDraft {
    pub fn validate(self) -> Result<NewsItem, DomainError> {
        Ok(NewsItem {
            id: self.id.filter(|id| !id.trim().is_empty()),
            title: require(self.title, "title")?,
            description: require(self.description, "description")?,
            slack_ts: require(self.slack_ts, "slack_ts")?,
            slack_permalink: require(self.slack_permalink, "slack_permalink")?,
            slack_channel: require(self.slack_channel, "slack_channel")?,
            links: self.links,
        })
    }
}

/// Parse an event token from a problem-statement mapping.
///
/// Tokens are either a bare event id or `"<title>|<id>"`.
pub fn event_id_from_token(token: &str) -> &str {
    match token.split_once('|') {
        Some((_, id)) => id,
        None => token,
    }
}
