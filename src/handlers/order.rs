use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::instrument;

use crate::models::{OrderRequest, OrderResponse};
use crate::services::OrderAccessor;

/// State shared by the order handlers
#[derive(Clone)]
pub struct OrderState {
    pub accessor: Arc<OrderAccessor>,
}

/// The HTTP status mirrors `statusCode`; the body is the envelope itself
impl IntoResponse for OrderResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Create the order router
pub fn create_order_router(accessor: Arc<OrderAccessor>) -> Router {
    Router::new()
        .route(
            "/order/:resource_id",
            get(get_order)
                .put(update_order)
                .post(update_order)
                .delete(delete_order),
        )
        .with_state(OrderState { accessor })
}

#[instrument(name = "get_order", skip(state), fields(order_id = %resource_id))]
pub async fn get_order(
    State(state): State<OrderState>,
    Path(resource_id): Path<String>,
) -> OrderResponse {
    state
        .accessor
        .fetch(&OrderRequest::for_order(resource_id))
        .await
}

/// The raw body is stored as-is, whatever its content type
#[instrument(name = "update_order", skip(state, body), fields(order_id = %resource_id, body_len = body.len()))]
pub async fn update_order(
    State(state): State<OrderState>,
    Path(resource_id): Path<String>,
    body: Bytes,
) -> OrderResponse {
    state.accessor.upsert_raw(resource_id, &body).await
}

#[instrument(name = "delete_order", skip(state), fields(order_id = %resource_id))]
pub async fn delete_order(
    State(state): State<OrderState>,
    Path(resource_id): Path<String>,
) -> OrderResponse {
    state
        .accessor
        .remove(&OrderRequest::for_order(resource_id))
        .await
}
