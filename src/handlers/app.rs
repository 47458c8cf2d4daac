use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use super::{create_order_router, health_check};
use crate::config::ServerConfig;
use crate::observability::{metrics_handler, observability_middleware, Metrics};
use crate::services::OrderAccessor;

/// Build the full service: order routes, health, metrics and the shared layers
pub fn create_app(metrics: Arc<Metrics>, accessor: Arc<OrderAccessor>, server: &ServerConfig) -> Router {
    let metrics_for_middleware = metrics.clone();

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(create_order_router(accessor))
        // Layers run outer to inner: observability, CORS, timeout, body limit
        .layer(DefaultBodyLimit::max(server.max_request_size))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
