use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the hash key attribute in the orders table
pub const ORDER_ID_ATTRIBUTE: &str = "OrderId";

/// Name of the attribute holding the stored order document
pub const DOC_ATTRIBUTE: &str = "doc";

/// An order record: key plus opaque document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "OrderId")]
    pub order_id: String,
    pub doc: String,
}

impl Order {
    pub fn new(order_id: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            doc: doc.into(),
        }
    }
}

/// Typed request handed to the accessor by the routing layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: String,
    pub payload: Option<String>,
}

impl OrderRequest {
    /// Request addressing an order without a payload (fetch, remove)
    pub fn for_order(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            payload: None,
        }
    }

    /// Request carrying a document to store (upsert)
    pub fn with_payload(order_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            payload: Some(payload.into()),
        }
    }

    /// Build the record written by an upsert; a missing payload is stored empty
    pub fn to_order(&self) -> Order {
        Order::new(
            self.order_id.clone(),
            self.payload.clone().unwrap_or_default(),
        )
    }
}

/// Uniform response envelope returned by every accessor operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

impl OrderResponse {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

/// Shape a response envelope, substituting an empty string when no body is given
pub fn create_response(status: StatusCode, body: Option<Value>) -> OrderResponse {
    OrderResponse {
        status_code: status.as_u16(),
        body: body.unwrap_or_else(|| Value::String(String::new())),
    }
}
