use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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
            "specchio_invalidation_messages_total",
            Unit::Count,
            "Total number of mutation messages read from the stream."
        );
        describe_counter!(
            "specchio_invalidation_ignored_total",
            Unit::Count,
            "Total number of mutation messages that required no invalidation."
        );
        describe_counter!(
            "specchio_invalidation_keys_dropped_total",
            Unit::Count,
            "Total number of rendered entries dropped by invalidation."
        );
        describe_counter!(
            "specchio_invalidation_delete_failures_total",
            Unit::Count,
            "Total number of rendered-entry deletions that failed."
        );
        describe_histogram!(
            "specchio_invalidation_process_ms",
            Unit::Milliseconds,
            "Per-message invalidation latency in milliseconds."
        );
    });
}
