use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            "affitto_cache_hit_total",
            Unit::Count,
            "Total number of cache hits, labeled by aggregate."
        );
        describe_counter!(
            "affitto_cache_miss_total",
            Unit::Count,
            "Total number of cache misses, labeled by aggregate."
        );
        describe_counter!(
            "affitto_cache_error_total",
            Unit::Count,
            "Total number of cache operations degraded by a backend or codec error."
        );
        describe_counter!(
            "affitto_cache_replica_failover_total",
            Unit::Count,
            "Total number of reads retried against the primary after a replica error."
        );
        describe_counter!(
            "affitto_task_enqueued_total",
            Unit::Count,
            "Total number of update intents accepted into the queue."
        );
        describe_counter!(
            "affitto_task_dropped_total",
            Unit::Count,
            "Total number of update intents rejected by a full queue."
        );
        describe_counter!(
            "affitto_task_processed_total",
            Unit::Count,
            "Total number of update intents applied by the worker."
        );
        describe_counter!(
            "affitto_task_failed_total",
            Unit::Count,
            "Total number of update intents that failed and were dropped."
        );
        describe_gauge!(
            "affitto_task_queue_len",
            Unit::Count,
            "Current number of pending update intents in the queue."
        );
        describe_histogram!(
            "affitto_task_process_ms",
            Unit::Milliseconds,
            "Per-task processing latency in milliseconds."
        );
    });
}
