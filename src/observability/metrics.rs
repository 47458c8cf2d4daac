use axum::{
    extract::State,
    http::{header, StatusCode},
};
use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Metrics collection for the order manager service
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // HTTP metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_in_flight: GaugeVec,

    // Order accessor metrics
    pub order_operations_total: CounterVec,
    pub order_operation_duration_seconds: HistogramVec,
    pub table_provisioning_total: CounterVec,
}

impl Metrics {
    /// Create a new metrics instance with all required metrics registered
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        info!("Initializing Prometheus metrics");

        let http_requests_total = CounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed",
            ),
            &["method", "endpoint", "status_code"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "endpoint"],
        )?;

        let http_requests_in_flight = GaugeVec::new(
            Opts::new(
                "http_requests_in_flight",
                "Number of HTTP requests currently being processed",
            ),
            &["method", "endpoint"],
        )?;

        let order_operations_total = CounterVec::new(
            Opts::new(
                "order_operations_total",
                "Total number of order accessor operations",
            ),
            &["operation", "status"],
        )?;

        let order_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "order_operation_duration_seconds",
                "Order accessor operation duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["operation"],
        )?;

        let table_provisioning_total = CounterVec::new(
            Opts::new(
                "table_provisioning_total",
                "Total number of table existence checks before writes",
            ),
            &["table", "outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(order_operations_total.clone()))?;
        registry.register(Box::new(order_operation_duration_seconds.clone()))?;
        registry.register(Box::new(table_provisioning_total.clone()))?;

        info!("Prometheus metrics initialized successfully");

        Ok(Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            order_operations_total,
            order_operation_duration_seconds,
            table_provisioning_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    /// Record HTTP request metrics
    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        duration_seconds: f64,
    ) {
        let status_str = status_code.to_string();

        self.http_requests_total
            .with_label_values(&[method, endpoint, &status_str])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration_seconds);
    }

    /// Record an accessor operation (fetch, upsert, remove)
    pub fn record_order_operation(&self, operation: &str, success: bool, duration_seconds: f64) {
        let status = if success { "success" } else { "error" };

        self.order_operations_total
            .with_label_values(&[operation, status])
            .inc();

        self.order_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_seconds);
    }

    /// Record the outcome of a pre-write table existence check
    pub fn record_table_provisioning(&self, table: &str, success: bool) {
        let outcome = if success { "ready" } else { "failed" };

        self.table_provisioning_total
            .with_label_values(&[table, outcome])
            .inc();
    }

    pub fn increment_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .inc();
    }

    pub fn decrement_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .dec();
    }
}

/// `GET /metrics`: the registry in Prometheus text exposition format
pub async fn metrics_handler(
    State(metrics): State<Arc<Metrics>>,
) -> Result<([(header::HeaderName, &'static str); 1], String), (StatusCode, String)> {
    metrics
        .encode()
        .map(|text| ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text))
        .map_err(|e| {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}
