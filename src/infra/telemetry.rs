use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub(crate) fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "hackhub_cache_resolver_hit_total",
            Unit::Count,
            "Resolver cache hits."
        );
        describe_counter!(
            "hackhub_cache_resolver_miss_total",
            Unit::Count,
            "Resolver cache misses."
        );
        describe_counter!(
            "hackhub_cache_resolver_evict_total",
            Unit::Count,
            "Resolver cache evictions due to capacity."
        );
        describe_counter!(
            "hackhub_cache_aggregate_hit_total",
            Unit::Count,
            "Aggregate view cache hits, labelled by cache."
        );
        describe_counter!(
            "hackhub_cache_aggregate_miss_total",
            Unit::Count,
            "Aggregate view cache misses (absent or expired), labelled by cache."
        );
        describe_counter!(
            "hackhub_cache_invalidate_total",
            Unit::Count,
            "Cache invalidations, labelled by scope."
        );
        describe_counter!(
            "hackhub_rate_limit_rejected_total",
            Unit::Count,
            "Calls rejected because their operation budget was spent."
        );
    });
}
