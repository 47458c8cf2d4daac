use serde_json::{json, Value};
use thiserror::Error;

/// Repository-level errors for data access and table provisioning
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("DynamoDB {operation} failed: {message}")]
    Store {
        operation: String,
        code: Option<String>,
        message: String,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("Timeout waiting for table {table_name} to become active")]
    Timeout { table_name: String },

    #[error("Order document is not valid UTF-8: {message}")]
    InvalidDocument { message: String },
}

impl RepositoryError {
    /// AWS error code reported by the store, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            RepositoryError::Store { code, .. } => code.as_deref(),
            RepositoryError::AwsSdk { .. } => None,
            RepositoryError::Timeout { .. } => Some("TableNotActive"),
            RepositoryError::InvalidDocument { .. } => Some("InvalidDocument"),
        }
    }

    /// Render the error as the object placed in a failed response body.
    ///
    /// The store's code and message pass through uninterpreted; nothing beyond
    /// them (request ids, raw HTTP responses) leaves the service.
    pub fn into_body(self) -> Value {
        let code = self.code().map(str::to_string);
        match self {
            RepositoryError::Store {
                operation, message, ..
            } => json!({
                "code": code,
                "message": message,
                "operation": operation,
            }),
            RepositoryError::AwsSdk { message } => json!({
                "code": code,
                "message": message,
            }),
            RepositoryError::Timeout { table_name } => json!({
                "code": code,
                "message": format!("Table {} did not become active", table_name),
                "operation": "CreateTable",
            }),
            RepositoryError::InvalidDocument { message } => json!({
                "code": code,
                "message": message,
                "operation": "PutItem",
            }),
        }
    }
}

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
