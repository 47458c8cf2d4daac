use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to initialize OpenTelemetry: {0}")]
    OpenTelemetryInit(#[from] opentelemetry::trace::TraceError),
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Settings for [`init_observability`]
#[derive(Debug, Clone)]
pub struct ObservabilitySettings<'a> {
    pub service_name: &'a str,
    pub service_version: &'a str,
    pub otlp_endpoint: Option<&'a str>,
    pub log_level: &'a str,
    pub enable_json_logging: bool,
}

/// Initialize OpenTelemetry tracing and structured logging
pub fn init_observability(settings: &ObservabilitySettings<'_>) -> Result<(), ObservabilityError> {
    let tracer = init_opentelemetry_tracer(
        settings.service_name,
        settings.service_version,
        settings.otlp_endpoint,
    )?;
    let opentelemetry_layer = OpenTelemetryLayer::new(tracer);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(settings.service_name, settings.log_level).into());

    let result = if settings.enable_json_logging {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_target(false)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(opentelemetry_layer)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(opentelemetry_layer)
            .with(fmt_layer)
            .try_init()
    };
    result.map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;

    info!(
        service = settings.service_name,
        version = settings.service_version,
        "Observability initialized"
    );
    Ok(())
}

/// Filter directive used when RUST_LOG is not set
pub fn default_filter(service_name: &str, log_level: &str) -> String {
    format!(
        "{}={level},tower_http={level},aws_sdk_dynamodb=warn,aws_config=warn,aws_smithy_runtime=warn",
        service_name.replace('-', "_"),
        level = log_level
    )
}

/// Extract the current trace ID from the active span context
pub fn get_current_trace_id() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

/// Log an info event carrying the current trace id
#[macro_export]
macro_rules! info_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::info!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::info!($($arg)*);
        }
    };
}

/// Log a warning carrying the current trace id
#[macro_export]
macro_rules! warn_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::warn!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::warn!($($arg)*);
        }
    };
}

/// Log an error carrying the current trace id
#[macro_export]
macro_rules! error_with_trace {
    ($($arg:tt)*) => {
        if let Some(trace_id) = $crate::observability::tracing::get_current_trace_id() {
            tracing::error!(trace_id = %trace_id, $($arg)*);
        } else {
            tracing::error!($($arg)*);
        }
    };
}

fn init_opentelemetry_tracer(
    service_name: &str,
    service_version: &str,
    otlp_endpoint: Option<&str>,
) -> Result<opentelemetry_sdk::trace::Tracer, ObservabilityError> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", service_version.to_string()),
        KeyValue::new("service.namespace", "saas-order-manager"),
        KeyValue::new("cloud.provider", "aws"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ]);

    let endpoint = otlp_endpoint
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or(DEFAULT_OTLP_ENDPOINT);
    info!("Using OTLP endpoint: {}", endpoint);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .with_batch_config(
            trace::BatchConfig::default()
                .with_max_queue_size(2048)
                .with_max_export_batch_size(512)
                .with_scheduled_delay(Duration::from_millis(500)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Flush and shut down the tracer provider, giving up after 5 seconds
pub async fn shutdown_observability() {
    info!("Shutting down observability");

    let shutdown_task = tokio::task::spawn_blocking(global::shutdown_tracer_provider);

    match tokio::time::timeout(Duration::from_secs(5), shutdown_task).await {
        Ok(Ok(())) => info!("Observability shutdown completed"),
        Ok(Err(e)) => warn!("Error during observability shutdown: {}", e),
        Err(_) => warn!("Observability shutdown timed out after 5 seconds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_crate_target() {
        let filter = default_filter("order-manager", "debug");
        assert!(filter.starts_with("order_manager=debug"));
        assert!(filter.contains("tower_http=debug"));
        assert!(filter.contains("aws_sdk_dynamodb=warn"));
    }

    #[test]
    fn test_trace_id_absent_outside_span() {
        assert!(get_current_trace_id().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_observability_completes() {
        let start = std::time::Instant::now();
        shutdown_observability().await;
        assert!(start.elapsed() < Duration::from_secs(6));
    }
}
