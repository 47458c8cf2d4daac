use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, Instrument};

use crate::models::{Order, RepositoryError, RepositoryResult, DOC_ATTRIBUTE, ORDER_ID_ATTRIBUTE};

/// Point operations against the orders table
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Look up the stored document for an order, `None` when no record exists
    async fn get_order(&self, order_id: &str) -> RepositoryResult<Option<String>>;

    /// Write an order, fully replacing any existing record with the same key
    async fn put_order(&self, order: &Order) -> RepositoryResult<()>;

    /// Delete an order by key; deleting a missing key succeeds
    async fn delete_order(&self, order_id: &str) -> RepositoryResult<()>;
}

/// Convert an SDK error into a store error, keeping the AWS code and message
pub(crate) fn map_dynamodb_error<E>(operation: &str, error: E) -> RepositoryError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    error!(operation = operation, "DynamoDB error: {}", DisplayErrorContext(&error));

    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());

    RepositoryError::Store {
        operation: operation.to_string(),
        code: error.code().map(str::to_string),
        message,
    }
}

/// DynamoDB implementation of the OrderRepository trait
pub struct DynamoDbOrderRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbOrderRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// Create a DynamoDB subsegment span with X-Ray attributes
    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.request_id" = tracing::field::Empty,
            "aws.agent" = "rust-aws-sdk",

            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,

            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),

            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,

            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,

            "component" = "aws-sdk-dynamodb",
        )
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key(&self, order_id: &str) -> (String, AttributeValue) {
        (
            ORDER_ID_ATTRIBUTE.to_string(),
            AttributeValue::S(order_id.to_string()),
        )
    }

    /// Convert an Order to DynamoDB attribute values
    pub fn order_to_item(&self, order: &Order) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert(
            ORDER_ID_ATTRIBUTE.to_string(),
            AttributeValue::S(order.order_id.clone()),
        );
        item.insert(
            DOC_ATTRIBUTE.to_string(),
            AttributeValue::S(order.doc.clone()),
        );
        item
    }

    /// Extract the stored document from an item.
    ///
    /// An item without a string `doc` yields an empty document.
    pub fn item_to_doc(&self, item: &HashMap<String, AttributeValue>) -> String {
        match item.get(DOC_ATTRIBUTE).and_then(|v| v.as_s().ok()) {
            Some(doc) => doc.clone(),
            None => {
                crate::warn_with_trace!(
                    attributes = ?item.keys().collect::<Vec<_>>(),
                    "Order item has no string doc attribute"
                );
                String::new()
            }
        }
    }
}

#[async_trait]
impl OrderRepository for DynamoDbOrderRepository {
    #[instrument(skip(self), fields(table = %self.table_name, order_id = %order_id))]
    async fn get_order(&self, order_id: &str) -> RepositoryResult<Option<String>> {
        let get_span = self.create_dynamodb_span("GetItem");
        let (key_name, key_value) = self.key(order_id);

        let response = async {
            let response = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key(key_name, key_value)
                .send()
                .await
                .map_err(|e| map_dynamodb_error("GetItem", e))?;

            if let Some(request_id) = response.request_id() {
                tracing::Span::current().record("aws.request_id", request_id);
            }
            Ok::<_, RepositoryError>(response)
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => {
                info!("Order found");
                Ok(Some(self.item_to_doc(&item)))
            }
            None => {
                info!("Order not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, order), fields(table = %self.table_name, order_id = %order.order_id, doc_len = order.doc.len()))]
    async fn put_order(&self, order: &Order) -> RepositoryResult<()> {
        let item = self.order_to_item(order);
        let put_span = self.create_dynamodb_span("PutItem");

        async {
            let response = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| map_dynamodb_error("PutItem", e))?;

            if let Some(request_id) = response.request_id() {
                tracing::Span::current().record("aws.request_id", request_id);
            }
            Ok::<_, RepositoryError>(())
        }
        .instrument(put_span)
        .await?;

        info!("Order saved");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table_name, order_id = %order_id))]
    async fn delete_order(&self, order_id: &str) -> RepositoryResult<()> {
        let delete_span = self.create_dynamodb_span("DeleteItem");
        let (key_name, key_value) = self.key(order_id);

        async {
            let response = self
                .client
                .delete_item()
                .table_name(&self.table_name)
                .key(key_name, key_value)
                .send()
                .await
                .map_err(|e| map_dynamodb_error("DeleteItem", e))?;

            if let Some(request_id) = response.request_id() {
                tracing::Span::current().record("aws.request_id", request_id);
            }
            Ok::<_, RepositoryError>(())
        }
        .instrument(delete_span)
        .await?;

        info!("Order deleted");
        Ok(())
    }
}
