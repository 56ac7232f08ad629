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
            "photostream_pages_served_total",
            Unit::Count,
            "Stream and search pages served, labelled by feed kind."
        );
        describe_counter!(
            "photostream_session_miss_total",
            Unit::Count,
            "Continuation requests that found no live session."
        );
        describe_counter!(
            "photostream_not_modified_total",
            Unit::Count,
            "Conditional requests answered with 304."
        );
        describe_counter!(
            "photostream_push_published_total",
            Unit::Count,
            "Push events handed to the transport."
        );
        describe_counter!(
            "photostream_push_failed_total",
            Unit::Count,
            "Push events the transport refused."
        );
    });
}
