//! Cache Manager.
//!
//! Two kinds of process-local cache back the read paths:
//!
//! - **Resolver cache**: bounded LRU of resolved documents keyed by id
//! - **Aggregate caches**: fixed-expiry caches for hackathon, event and news views
//!
//! Invalidation is coarse: every structural mutation calls
//! [`CacheManager::invalidate_all`]. Configuration lives in the `[cache]`
//! table of `hackhub.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! resolver_limit = 655360
//! event_ttl_seconds = 600
//! ```

mod config;
mod lock;
mod manager;
mod store;

pub use config::CacheConfig;
pub use manager::{CacheManager, Epoch, NewsKey};
pub use store::{ResolvedStore, TtlStore};
