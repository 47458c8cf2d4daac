use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::models::{
    create_response, OrderRequest, OrderResponse, RepositoryError, RepositoryResult,
    TableDefinition,
};
use crate::observability::Metrics;
use crate::repositories::{OrderRepository, TableProvisioner};
use crate::services::RequestLogger;

/// Source name attached to every accessor log event
pub const SOURCE_NAME: &str = "OrderManager";

/// Fetch, upsert and remove for order records.
///
/// Each operation logs once, issues exactly one store call and shapes the
/// outcome into an [`OrderResponse`]. Store failures never surface as `Err`;
/// they become a 500 envelope carrying the store error object.
pub struct OrderAccessor {
    repository: Arc<dyn OrderRepository>,
    provisioner: Arc<dyn TableProvisioner>,
    logger: Arc<dyn RequestLogger>,
    table: TableDefinition,
    metrics: Option<Arc<Metrics>>,
}

impl OrderAccessor {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        provisioner: Arc<dyn TableProvisioner>,
        logger: Arc<dyn RequestLogger>,
        table: TableDefinition,
    ) -> Self {
        Self {
            repository,
            provisioner,
            logger,
            table,
            metrics: None,
        }
    }

    /// Create an accessor that records operation metrics
    pub fn new_with_metrics(
        repository: Arc<dyn OrderRepository>,
        provisioner: Arc<dyn TableProvisioner>,
        logger: Arc<dyn RequestLogger>,
        table: TableDefinition,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(repository, provisioner, logger, table)
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }

    /// Read the stored document; a missing record is a 200 with a null body
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn fetch(&self, request: &OrderRequest) -> OrderResponse {
        let start = Instant::now();
        self.log(request, "DAL GetOrder() called.");

        let response = match self.repository.get_order(&request.order_id).await {
            Ok(Some(doc)) => create_response(StatusCode::OK, Some(Value::String(doc))),
            Ok(None) => create_response(StatusCode::OK, Some(Value::Null)),
            Err(err) => failure(err),
        };

        self.record("fetch", &response, start);
        response
    }

    /// Create or fully replace the record once the table is known to exist
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn upsert(&self, request: &OrderRequest) -> OrderResponse {
        let start = Instant::now();
        self.log(request, "DAL UpdateOrder() called.");

        let response = match self.ensure_table().await {
            Err(err) => failure(err),
            Ok(()) => match self.repository.put_order(&request.to_order()).await {
                Ok(()) => create_response(StatusCode::OK, None),
                Err(err) => failure(err),
            },
        };

        self.record("upsert", &response, start);
        response
    }

    /// Upsert a raw request body.
    ///
    /// Bodies that are not UTF-8 are logged like any upsert and answered with a
    /// 500 envelope; nothing is provisioned or written for them.
    #[instrument(skip(self, order_id, body), fields(body_len = body.len()))]
    pub async fn upsert_raw(&self, order_id: impl Into<String>, body: &[u8]) -> OrderResponse {
        let order_id = order_id.into();
        match std::str::from_utf8(body) {
            Ok(doc) => self.upsert(&OrderRequest::with_payload(order_id, doc)).await,
            Err(err) => {
                let start = Instant::now();
                self.log(&OrderRequest::for_order(order_id), "DAL UpdateOrder() called.");

                let response = failure(RepositoryError::InvalidDocument {
                    message: err.to_string(),
                });

                self.record("upsert", &response, start);
                response
            }
        }
    }

    /// Delete the record unconditionally; a missing key is still a 200
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn remove(&self, request: &OrderRequest) -> OrderResponse {
        let start = Instant::now();
        self.log(request, "DAL deleteOrder() called.");

        let response = match self.repository.delete_order(&request.order_id).await {
            Ok(()) => create_response(StatusCode::OK, None),
            Err(err) => failure(err),
        };

        self.record("remove", &response, start);
        response
    }

    fn log(&self, request: &OrderRequest, message: &str) {
        self.logger.log(
            request,
            SOURCE_NAME,
            json!({
                "Message": message,
                "OrderId": request.order_id,
            }),
        );
    }

    async fn ensure_table(&self) -> RepositoryResult<()> {
        let result = self.provisioner.ensure_table(&self.table).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_table_provisioning(&self.table.table_name, result.is_ok());
        }
        result
    }

    fn record(&self, operation: &str, response: &OrderResponse, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_order_operation(
                operation,
                response.is_success(),
                start.elapsed().as_secs_f64(),
            );
        }
    }
}

fn failure(err: RepositoryError) -> OrderResponse {
    crate::error_with_trace!(code = ?err.code(), "Order operation failed: {}", err);
    create_response(StatusCode::INTERNAL_SERVER_ERROR, Some(err.into_body()))
}
