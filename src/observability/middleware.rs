use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{Status, TraceContextExt};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;

/// Request attributes captured before the handler runs
#[derive(Debug, Clone)]
struct RequestMeta {
    method: String,
    uri: String,
    endpoint: String,
    user_agent: String,
    client_ip: String,
}

impl RequestMeta {
    fn from_request(request: &Request) -> Self {
        let uri = request.uri().to_string();
        // Group by route template so order ids do not explode label cardinality
        let endpoint = request
            .extensions()
            .get::<MatchedPath>()
            .map(|matched_path| matched_path.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        Self {
            method: request.method().to_string(),
            uri,
            endpoint,
            user_agent: header_value(request.headers(), "user-agent")
                .unwrap_or("unknown")
                .to_string(),
            client_ip: client_ip(request.headers()),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// First address in X-Forwarded-For, then X-Real-IP
fn client_ip(headers: &HeaderMap) -> String {
    header_value(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .or_else(|| header_value(headers, "x-real-ip"))
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

/// Middleware for request tracing and HTTP metrics
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let meta = RequestMeta::from_request(&request);
    let span_name = format!("{} {}", meta.method, meta.endpoint);

    let span = tracing::info_span!(
        target: "order_manager::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %meta.method,
        http.route = %meta.endpoint,
        http.url = %meta.uri,
        http.user_agent = %meta.user_agent,
        client.address = %meta.client_ip,
        http.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async move {
        metrics.increment_in_flight(&meta.method, &meta.endpoint);

        let current_span = tracing::Span::current();
        let trace_id = current_span
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        info!(trace_id = %trace_id, method = %meta.method, path = %meta.endpoint, "Processing request");

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let status_code = response.status().as_u16();

        current_span.record("http.status_code", status_code);
        current_span.record("http.response_time_ms", duration.as_millis() as u64);

        let otel_context = current_span.context();
        let otel_span = otel_context.span();
        if status_code >= 500 {
            otel_span.set_status(Status::error("HTTP server error"));
        } else {
            otel_span.set_status(Status::Ok);
        }

        metrics.record_http_request(
            &meta.method,
            &meta.endpoint,
            status_code,
            duration.as_secs_f64(),
        );
        metrics.decrement_in_flight(&meta.method, &meta.endpoint);

        if status_code >= 500 {
            error!(
                trace_id = %trace_id,
                method = %meta.method,
                path = %meta.endpoint,
                status_code = status_code,
                duration_ms = duration.as_millis() as u64,
                client_ip = %meta.client_ip,
                "Request failed"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %meta.method,
                path = %meta.endpoint,
                status_code = status_code,
                duration_ms = duration.as_millis() as u64,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}
