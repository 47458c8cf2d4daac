use serde_json::Value;

use crate::models::OrderRequest;

/// Structured, fire-and-forget event sink for accessor calls
pub trait RequestLogger: Send + Sync {
    fn log(&self, request: &OrderRequest, source: &str, detail: Value);
}

/// Emits request events through `tracing`, tagged with the active trace id
#[derive(Debug, Clone)]
pub struct LogManager {
    service_name: String,
}

impl LogManager {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl RequestLogger for LogManager {
    fn log(&self, request: &OrderRequest, source: &str, detail: Value) {
        let message = detail
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("request event")
            .to_string();

        crate::info_with_trace!(
            service = %self.service_name,
            source = source,
            order_id = %request.order_id,
            has_payload = request.payload.is_some(),
            detail = %detail,
            "{}",
            message
        );
    }
}
