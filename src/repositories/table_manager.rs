use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::order_repository::map_dynamodb_error;
use crate::models::{RepositoryError, RepositoryResult, TableDefinition};

/// Idempotent create-if-absent provisioning of a table
#[async_trait]
pub trait TableProvisioner: Send + Sync {
    /// Resolve once the table described by `definition` exists.
    ///
    /// Repeated calls for an existing table succeed without side effects.
    async fn ensure_table(&self, definition: &TableDefinition) -> RepositoryResult<()>;
}

/// Manages DynamoDB table creation
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    confirmed_tables: RwLock<HashSet<String>>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl TableManager {
    /// Create a table manager polling every 2 seconds for up to 2 minutes
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self::with_polling(client, Duration::from_secs(2), 60)
    }

    pub fn with_polling(client: Arc<DynamoDbClient>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            client,
            confirmed_tables: RwLock::new(HashSet::new()),
            poll_interval,
            max_attempts,
        }
    }

    /// Whether this manager has already confirmed the table exists
    pub async fn is_confirmed(&self, table_name: &str) -> bool {
        self.confirmed_tables.read().await.contains(table_name)
    }

    /// Create the table described by `definition`.
    ///
    /// Returns `false` when another creator got there first.
    #[instrument(skip(self, definition), fields(table_name = %definition.table_name))]
    pub async fn create_table(&self, definition: &TableDefinition) -> RepositoryResult<bool> {
        info!("Creating table");

        let result = self
            .client
            .create_table()
            .table_name(&definition.table_name)
            .set_attribute_definitions(Some(attribute_definitions(definition)?))
            .set_key_schema(Some(key_schema(definition)?))
            .billing_mode(BillingMode::Provisioned)
            .provisioned_throughput(provisioned_throughput(definition)?)
            .send()
            .await;

        let created = match result {
            Ok(_) => true,
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_resource_in_use_exception())
                    .unwrap_or(false) =>
            {
                info!("Table is already being created");
                false
            }
            Err(e) => return Err(map_dynamodb_error("CreateTable", e)),
        };

        info!("Waiting for table to become active");
        self.wait_for_table_active(&definition.table_name).await?;
        Ok(created)
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        Ok(self.lookup_table(table_name).await?.is_some())
    }

    /// Describe a table; `None` when it does not exist, otherwise its status
    async fn lookup_table(&self, table_name: &str) -> RepositoryResult<Option<Option<TableStatus>>> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(response) => {
                debug!("Table exists");
                Ok(Some(response.table.and_then(|table| table.table_status)))
            }
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_resource_not_found_exception())
                    .unwrap_or(false) =>
            {
                info!("Table does not exist");
                Ok(None)
            }
            Err(e) => Err(map_dynamodb_error("DescribeTable", e)),
        }
    }

    /// Current status of a table
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_status(&self, table_name: &str) -> RepositoryResult<Option<TableStatus>> {
        let response = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| map_dynamodb_error("DescribeTable", e))?;

        Ok(response.table.and_then(|table| table.table_status))
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        let mut attempts = 0;

        loop {
            match self.table_status(table_name).await? {
                Some(TableStatus::Active) => {
                    info!("Table is now active");
                    return Ok(());
                }
                Some(status) => {
                    debug!("Table status: {:?}, waiting...", status);
                }
                None => {
                    warn!("Table status unknown, waiting...");
                }
            }

            attempts += 1;
            if attempts >= self.max_attempts {
                error!("Timeout waiting for table to become active");
                return Err(RepositoryError::Timeout {
                    table_name: table_name.to_string(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Delete a table (for testing/cleanup)
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn delete_table(&self, table_name: &str) -> RepositoryResult<()> {
        if !self.table_exists(table_name).await? {
            info!("Table does not exist, nothing to delete");
            return Ok(());
        }

        self.client
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| map_dynamodb_error("DeleteTable", e))?;

        self.confirmed_tables.write().await.remove(table_name);
        info!("Table deletion initiated");
        Ok(())
    }

    /// List all tables (for debugging/admin)
    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> RepositoryResult<Vec<String>> {
        let response = self
            .client
            .list_tables()
            .send()
            .await
            .map_err(|e| map_dynamodb_error("ListTables", e))?;

        let table_names = response.table_names.unwrap_or_default();
        info!("Found {} tables", table_names.len());
        Ok(table_names)
    }
}

#[async_trait]
impl TableProvisioner for TableManager {
    #[instrument(skip(self, definition), fields(table_name = %definition.table_name))]
    async fn ensure_table(&self, definition: &TableDefinition) -> RepositoryResult<()> {
        if self.is_confirmed(&definition.table_name).await {
            return Ok(());
        }

        match self.lookup_table(&definition.table_name).await? {
            None => {
                self.create_table(definition).await?;
            }
            Some(Some(TableStatus::Active)) => {}
            Some(status) => {
                info!(status = ?status, "Table exists but is not active yet");
                self.wait_for_table_active(&definition.table_name).await?;
            }
        }

        self.confirmed_tables
            .write()
            .await
            .insert(definition.table_name.clone());
        Ok(())
    }
}

fn attribute_definitions(definition: &TableDefinition) -> RepositoryResult<Vec<AttributeDefinition>> {
    let hash_key = AttributeDefinition::builder()
        .attribute_name(&definition.hash_key)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build attribute definition: {}", e),
        })?;
    Ok(vec![hash_key])
}

fn key_schema(definition: &TableDefinition) -> RepositoryResult<Vec<KeySchemaElement>> {
    let hash_key = KeySchemaElement::builder()
        .attribute_name(&definition.hash_key)
        .key_type(KeyType::Hash)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build key schema: {}", e),
        })?;
    Ok(vec![hash_key])
}

fn provisioned_throughput(definition: &TableDefinition) -> RepositoryResult<ProvisionedThroughput> {
    ProvisionedThroughput::builder()
        .read_capacity_units(definition.read_capacity_units)
        .write_capacity_units(definition.write_capacity_units)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build provisioned throughput: {}", e),
        })
}
