use std::str::FromStr;
use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing::level_filters::LevelFilter;
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

    let level = LevelFilter::from_str(&logging.level).unwrap_or(LevelFilter::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "strato_cache_memory_hit_total",
            Unit::Count,
            "Total number of memory-layer cache hits."
        );
        describe_counter!(
            "strato_cache_memory_miss_total",
            Unit::Count,
            "Total number of memory-layer cache misses."
        );
        describe_counter!(
            "strato_cache_remote_hit_total",
            Unit::Count,
            "Total number of remote-layer cache hits."
        );
        describe_counter!(
            "strato_cache_remote_miss_total",
            Unit::Count,
            "Total number of remote-layer cache misses."
        );
        describe_counter!(
            "strato_cache_compute_total",
            Unit::Count,
            "Total number of compute-callback invocations on full misses."
        );
        describe_counter!(
            "strato_cache_evict_total",
            Unit::Count,
            "Total number of memory-layer evictions due to capacity."
        );
        describe_gauge!(
            "strato_cache_queue_len",
            Unit::Count,
            "Current number of pending invalidation tasks, labelled by kind."
        );
        describe_histogram!(
            "strato_cache_flush_ms",
            Unit::Milliseconds,
            "Invalidation queue processing-pass latency in milliseconds."
        );
    });
}
