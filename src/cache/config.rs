//! Cache sizing and expiry.
//!
//! Populated from the `[cache]` table of `hackhub.toml`; defaults mirror the
//! production deployment.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_RESOLVER_LIMIT: usize = 640 * 1024;
const DEFAULT_AGGREGATE_LIMIT: usize = 100;
const DEFAULT_HACKATHON_TTL_SECS: u64 = 600;
const DEFAULT_EVENT_TTL_SECS: u64 = 600;
const DEFAULT_NEWS_TTL_SECS: u64 = 32_600;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every lookup misses and nothing is stored.
    pub enabled: bool,
    /// Maximum resolved documents kept by the resolver LRU.
    pub resolver_limit: usize,
    /// Maximum entries per aggregate (TTL) cache.
    pub aggregate_limit: usize,
    pub hackathon_ttl_secs: u64,
    pub event_ttl_secs: u64,
    pub news_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolver_limit: DEFAULT_RESOLVER_LIMIT,
            aggregate_limit: DEFAULT_AGGREGATE_LIMIT,
            hackathon_ttl_secs: DEFAULT_HACKATHON_TTL_SECS,
            event_ttl_secs: DEFAULT_EVENT_TTL_SECS,
            news_ttl_secs: DEFAULT_NEWS_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            resolver_limit: settings.resolver_limit.get(),
            aggregate_limit: settings.aggregate_limit.get(),
            hackathon_ttl_secs: settings.hackathon_ttl.as_secs(),
            event_ttl_secs: settings.event_ttl.as_secs(),
            news_ttl_secs: settings.news_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Returns the resolver limit as NonZeroUsize, clamping to 1 if zero.
    pub fn resolver_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.resolver_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn aggregate_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.aggregate_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn hackathon_ttl(&self) -> Duration {
        Duration::from_secs(self.hackathon_ttl_secs)
    }

    pub fn event_ttl(&self) -> Duration {
        Duration::from_secs(self.event_ttl_secs)
    }

    pub fn news_ttl(&self) -> Duration {
        Duration::from_secs(self.news_ttl_secs)
    }
}
