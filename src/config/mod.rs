//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::HashMap,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::infra::rate_limit::{Budget, Operation};

pub use cli::{
    CliArgs, CliOverrides, Command, GetArgs, HackathonsArgs, LinkArgs, ListArgs, MembershipArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "hackhub";
const ENV_PREFIX: &str = "HACKHUB";
const DEFAULT_DATA_FILE: &str = "hackhub.json";
const DEFAULT_AUDIT_CHANNEL: &str = "log-team-creation";
const DEFAULT_CODE_HOST_URL: &str = "https://github.com/2024-Arizona-Opportunity-Hack";
const DEFAULT_PROJECT_URL_BASE: &str = "https://ohack.dev/project";
const DEFAULT_RESOLVER_LIMIT: u64 = 640 * 1024;
const DEFAULT_AGGREGATE_LIMIT: u64 = 100;
const DEFAULT_HACKATHON_TTL_SECS: u64 = 600;
const DEFAULT_EVENT_TTL_SECS: u64 = 600;
const DEFAULT_NEWS_TTL_SECS: u64 = 32_600;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub store: StoreSettings,
    pub channels: ChannelSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub resolver_limit: NonZeroUsize,
    pub aggregate_limit: NonZeroUsize,
    pub hackathon_ttl: Duration,
    pub event_ttl: Duration,
    pub news_ttl: Duration,
}

/// Per-operation budget overrides; operations not listed keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct RateLimitSettings {
    pub budgets: HashMap<Operation, Budget>,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub data_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub audit_channel: String,
    pub admin_ids: Vec<String>,
    pub project_url_base: String,
    pub code_host_url: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("channels.admin_ids")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    rate_limit: HashMap<String, RawBudget>,
    store: RawStoreSettings,
    channels: RawChannelSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(path) = overrides.data_file.as_ref() {
            self.store.data_file = Some(path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if overrides.no_cache {
            self.cache.enabled = Some(false);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            rate_limit,
            store,
            channels,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            store: build_store_settings(store)?,
            channels: build_channel_settings(channels),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        resolver_limit: non_zero_usize(
            cache.resolver_limit.unwrap_or(DEFAULT_RESOLVER_LIMIT),
            "cache.resolver_limit",
        )?,
        aggregate_limit: non_zero_usize(
            cache.aggregate_limit.unwrap_or(DEFAULT_AGGREGATE_LIMIT),
            "cache.aggregate_limit",
        )?,
        hackathon_ttl: positive_seconds(
            cache.hackathon_ttl_seconds.unwrap_or(DEFAULT_HACKATHON_TTL_SECS),
            "cache.hackathon_ttl_seconds",
        )?,
        event_ttl: positive_seconds(
            cache.event_ttl_seconds.unwrap_or(DEFAULT_EVENT_TTL_SECS),
            "cache.event_ttl_seconds",
        )?,
        news_ttl: positive_seconds(
            cache.news_ttl_seconds.unwrap_or(DEFAULT_NEWS_TTL_SECS),
            "cache.news_ttl_seconds",
        )?,
    })
}

fn build_rate_limit_settings(
    raw: HashMap<String, RawBudget>,
) -> Result<RateLimitSettings, LoadError> {
    let mut budgets = HashMap::with_capacity(raw.len());
    for (name, budget) in raw {
        let key = format!("rate_limit.{name}");
        let operation = Operation::from_str(&name)
            .map_err(|err| LoadError::invalid(key.clone(), err.to_string()))?;
        let defaults = operation.default_budget();

        let max_calls = match budget.max_calls {
            Some(0) => return Err(LoadError::invalid(key, "max_calls must be greater than zero")),
            Some(calls) => u32::try_from(calls).map_err(|_| {
                LoadError::invalid(key.clone(), "max_calls exceeds supported range for u32")
            })?,
            None => defaults.max_calls,
        };
        let window = match budget.window_seconds {
            Some(seconds) => positive_seconds(seconds, "rate_limit.window_seconds")?,
            None => defaults.window,
        };
        budgets.insert(operation, Budget::new(max_calls, window));
    }
    Ok(RateLimitSettings { budgets })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let data_file = store
        .data_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
    if data_file.as_os_str().is_empty() {
        return Err(LoadError::invalid("store.data_file", "path must not be empty"));
    }
    Ok(StoreSettings { data_file })
}

fn build_channel_settings(channels: RawChannelSettings) -> ChannelSettings {
    ChannelSettings {
        audit_channel: channels
            .audit_channel
            .unwrap_or_else(|| DEFAULT_AUDIT_CHANNEL.to_string()),
        admin_ids: channels
            .admin_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
        project_url_base: channels
            .project_url_base
            .unwrap_or_else(|| DEFAULT_PROJECT_URL_BASE.to_string()),
        code_host_url: channels
            .code_host_url
            .unwrap_or_else(|| DEFAULT_CODE_HOST_URL.to_string()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    resolver_limit: Option<u64>,
    aggregate_limit: Option<u64>,
    hackathon_ttl_seconds: Option<u64>,
    event_ttl_seconds: Option<u64>,
    news_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBudget {
    max_calls: Option<u64>,
    window_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    data_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawChannelSettings {
    audit_channel: Option<String>,
    admin_ids: Vec<String>,
    project_url_base: Option<String>,
    code_host_url: Option<String>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
mod tests;
