use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use order_manager::config::ServerConfig;
use order_manager::handlers::create_app;
use order_manager::models::{Order, RepositoryResult, TableDefinition};
use order_manager::repositories::OrderRepository;
use order_manager::services::OrderAccessor;
use order_manager::Metrics;

mod common;
use common::*;

fn server_config(max_request_size: usize, request_timeout_seconds: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8080,
        request_timeout_seconds,
        max_request_size,
    }
}

fn app(state: &TestAccessor, metrics: Arc<Metrics>) -> Router {
    create_app(metrics, state.accessor.clone(), &server_config(1024, 30))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, bytes.to_vec())
}

#[tokio::test]
async fn test_health_route_on_composed_app() {
    let state = TestAccessor::new();
    let app = app(&state, Arc::new(Metrics::new().unwrap()));

    let request = Request::builder()
        .uri("/health/status")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "order-manager");
}

#[tokio::test]
async fn test_order_requests_are_measured_by_route_template() {
    let state = TestAccessor::new();
    let app = app(&state, Arc::new(Metrics::new().unwrap()));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/order/o-1")
        .body(Body::from("{\"qty\":1}"))
        .unwrap();
    let (status, _, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], prometheus::TEXT_FORMAT);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("endpoint=\"/order/:resource_id\""));
    assert!(!text.contains("endpoint=\"/order/o-1\""));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let state = TestAccessor::new();
    let app = create_app(
        Arc::new(Metrics::new().unwrap()),
        state.accessor.clone(),
        &server_config(16, 30),
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/order/o-big")
        .body(Body::from(vec![b'x'; 64]))
        .unwrap();
    let (status, _, _) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state.repository.len(), 0);
}

#[tokio::test]
async fn test_body_within_limit_is_stored() {
    let state = TestAccessor::new();
    let app = create_app(
        Arc::new(Metrics::new().unwrap()),
        state.accessor.clone(),
        &server_config(16, 30),
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/order/o-small")
        .body(Body::from("0123456789abcdef"))
        .unwrap();
    let (status, _, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        state.repository.stored_doc("o-small").as_deref(),
        Some("0123456789abcdef")
    );
}

#[tokio::test]
async fn test_cors_preflight_is_answered() {
    let state = TestAccessor::new();
    let app = app(&state, Arc::new(Metrics::new().unwrap()));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/order/o-1")
        .header(header::ORIGIN, "https://tenant.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

/// Repository whose reads never finish within the request timeout
struct StalledRepository;

#[async_trait]
impl OrderRepository for StalledRepository {
    async fn get_order(&self, _order_id: &str) -> RepositoryResult<Option<String>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }

    async fn put_order(&self, _order: &Order) -> RepositoryResult<()> {
        Ok(())
    }

    async fn delete_order(&self, _order_id: &str) -> RepositoryResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_request_timeout_applies() {
    let accessor = Arc::new(OrderAccessor::new(
        Arc::new(StalledRepository),
        Arc::new(CountingProvisioner::default()),
        Arc::new(RecordingLogger::default()),
        TableDefinition::default(),
    ));
    let app = create_app(Arc::new(Metrics::new().unwrap()), accessor, &server_config(1024, 1));

    let request = Request::builder()
        .uri("/order/o-slow")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(app, request).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
}
