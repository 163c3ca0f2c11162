//! Read-side aggregate views over the document store.
//!
//! Listing pages are shallow (related documents appear as bare ids); the
//! hackathon listings, single-event detail and nonprofit listing expand their
//! references one level deep.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use crate::application::error::AppError;
use crate::application::repos::{Direction, DocumentStore, FilterOp, Query};
use crate::application::resolver::Resolver;
use crate::cache::{CacheManager, NewsKey};
use crate::domain::documents::{DocRef, Fields, FlatDocument, Value, collections};
use crate::domain::payloads::NewsItem;

/// Look-back for the "previous" hackathon listing (roughly three years).
const PREVIOUS_LOOKBACK_DAYS: i64 = 12 * 30 * 3;
const PREVIOUS_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HackathonWindow {
    #[default]
    All,
    /// Events ending today or later.
    Current,
    /// The three most recent events that already ended.
    Previous,
}

impl HackathonWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            HackathonWindow::All => "all",
            HackathonWindow::Current => "current",
            HackathonWindow::Previous => "previous",
        }
    }
}

impl fmt::Display for HackathonWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown hackathon window `{0}`")]
pub struct UnknownWindow(String);

impl FromStr for HackathonWindow {
    type Err = UnknownWindow;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(HackathonWindow::All),
            "current" => Ok(HackathonWindow::Current),
            "previous" => Ok(HackathonWindow::Previous),
            other => Err(UnknownWindow(other.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct Catalog {
    resolver: Resolver,
    store: Arc<dyn DocumentStore>,
    cache: Arc<CacheManager>,
}

impl Catalog {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            store: resolver.store().clone(),
            cache: resolver.cache().clone(),
            resolver,
        }
    }

    #[instrument(skip(self))]
    pub async fn hackathon_by_id(&self, id: &str) -> Result<Option<FlatDocument>, AppError> {
        if let Some(hit) = self.cache.hackathon(id) {
            return Ok(Some(hit));
        }
        let epoch = self.cache.epoch();
        let reference = DocRef::new(collections::HACKATHONS, id);
        let Some(hackathon) = self.resolver.resolve_ref(&reference).await? else {
            return Ok(None);
        };
        self.cache.store_hackathon(epoch, id, hackathon.clone());
        Ok(Some(hackathon))
    }

    /// Event detail: the hackathon whose `event_id` matches, with its
    /// nonprofits and teams expanded.
    #[instrument(skip(self))]
    pub async fn hackathon_event(&self, event_id: &str) -> Result<Option<Json>, AppError> {
        if let Some(hit) = self.cache.event(event_id) {
            return Ok(Some(hit));
        }
        let epoch = self.cache.epoch();
        let query = Query::new()
            .filter("event_id", FilterOp::Eq, event_id)
            .limit(1);
        let Some(snapshot) = self
            .store
            .query(collections::HACKATHONS, &query)
            .await?
            .into_iter()
            .next()
        else {
            warn!(event_id, "No hackathon for event");
            return Ok(None);
        };

        let mut event = self.resolver.flatten_read(&snapshot, epoch);
        for field in ["nonprofits", "teams"] {
            let expanded = match snapshot.get(field) {
                Some(value) => self.resolver.resolve_recursive(value).await?,
                None => Json::Array(Vec::new()),
            };
            event.insert(field, expanded);
        }

        let view = event.into_json();
        self.cache.store_event(epoch, event_id, view.clone());
        Ok(Some(view))
    }

    #[instrument(skip(self))]
    pub async fn nonprofit(&self, id: &str) -> Result<Option<FlatDocument>, AppError> {
        let reference = DocRef::new(collections::NONPROFITS, id);
        Ok(self.resolver.resolve_ref(&reference).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_hackathons(
        &self,
        window: HackathonWindow,
        today: Date,
    ) -> Result<Vec<FlatDocument>, AppError> {
        let today_key = today.to_string();
        let query = match window {
            HackathonWindow::All => Query::new().order_by("start_date", Direction::Ascending),
            HackathonWindow::Current => Query::new()
                .filter("end_date", FilterOp::Ge, today_key)
                .order_by("end_date", Direction::Descending),
            HackathonWindow::Previous => {
                let earliest = today
                    .checked_sub(Duration::days(PREVIOUS_LOOKBACK_DAYS))
                    .unwrap_or(Date::MIN);
                Query::new()
                    .filter("end_date", FilterOp::Ge, earliest.to_string())
                    .filter("end_date", FilterOp::Le, today_key)
                    .order_by("end_date", Direction::Descending)
                    .limit(PREVIOUS_LIMIT)
            }
        };
        let hackathons = self.resolver.list_deep(collections::HACKATHONS, &query).await?;
        debug!(results = hackathons.len(), "Hackathon list");
        Ok(hackathons)
    }

    pub async fn list_teams(&self) -> Result<Vec<FlatDocument>, AppError> {
        Ok(self.resolver.list(collections::TEAMS, &Query::new()).await?)
    }

    pub async fn team(&self, id: &str) -> Result<Option<FlatDocument>, AppError> {
        let reference = DocRef::new(collections::TEAMS, id);
        Ok(self.resolver.resolve_ref(&reference).await?)
    }

    pub async fn list_nonprofits(&self) -> Result<Vec<FlatDocument>, AppError> {
        let query = Query::new().order_by("rank", Direction::Ascending);
        Ok(self.resolver.list_deep(collections::NONPROFITS, &query).await?)
    }

    /// Newest news first, or the single item `id`.
    #[instrument(skip(self))]
    pub async fn news(&self, limit: usize, id: Option<&str>) -> Result<Vec<FlatDocument>, AppError> {
        let key: NewsKey = (limit, id.map(str::to_string));
        if let Some(hit) = self.cache.news(&key) {
            return Ok(hit);
        }
        let epoch = self.cache.epoch();

        let items: Vec<FlatDocument> = match id {
            Some(id) => self
                .store
                .get(&DocRef::new(collections::NEWS, id))
                .await?
                .map(|snapshot| FlatDocument::from_fields(snapshot.id(), &snapshot.fields))
                .into_iter()
                .collect(),
            None => {
                let query = Query::new()
                    .order_by("slack_ts", Direction::Descending)
                    .limit(limit);
                self.store
                    .query(collections::NEWS, &query)
                    .await?
                    .iter()
                    .map(|snapshot| FlatDocument::from_fields(snapshot.id(), &snapshot.fields))
                    .collect()
            }
        };

        self.cache.store_news(epoch, key, items.clone());
        Ok(items)
    }

    /// Upsert a news item and drop cached news pages.
    #[instrument(skip(self, item), fields(slack_ts = %item.slack_ts))]
    pub async fn save_news(&self, item: NewsItem) -> Result<DocRef, AppError> {
        let last_updated = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| AppError::unexpected(format!("failed to format timestamp: {err}")))?;

        let links = item
            .links
            .into_iter()
            .map(|link| {
                let mut entry = Fields::new();
                entry.insert("name".into(), Value::text(link.name));
                entry.insert("link".into(), Value::text(link.link));
                Value::Map(entry)
            })
            .collect();

        let mut fields = Fields::new();
        fields.insert("title".into(), Value::text(item.title));
        fields.insert("description".into(), Value::text(item.description));
        fields.insert("slack_ts".into(), Value::text(item.slack_ts));
        fields.insert("slack_permalink".into(), Value::text(item.slack_permalink));
        fields.insert("slack_channel".into(), Value::text(item.slack_channel));
        fields.insert("links".into(), Value::List(links));
        fields.insert("last_updated".into(), Value::text(last_updated));

        let reference = match item.id {
            Some(id) => {
                let reference = DocRef::new(collections::NEWS, id);
                self.store.set(&reference, fields, true).await?;
                reference
            }
            None => self.store.add(collections::NEWS, fields).await?,
        };

        info!(news_id = %reference.id, "Saved news");
        self.cache.invalidate_news();
        Ok(reference)
    }

    /// Generic shallow listing.
    pub async fn list_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<FlatDocument>, AppError> {
        Ok(self.resolver.list(collection, query).await?)
    }
}
