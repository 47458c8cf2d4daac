use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::TableDefinition;

/// Prefix of every environment variable read by the service
pub const ENV_PREFIX: &str = "ORDER_MANAGER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_capacity_units")]
    pub read_capacity_units: i64,
    #[serde(default = "default_capacity_units")]
    pub write_capacity_units: i64,
    /// Overrides the DynamoDB endpoint, e.g. for DynamoDB Local
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// SSM parameter whose value, when present, replaces `table_name`
    #[serde(default)]
    pub table_name_parameter: Option<String>,
    #[serde(default = "default_table_poll_interval")]
    pub table_poll_interval_seconds: u64,
    #[serde(default = "default_table_poll_max_attempts")]
    pub table_poll_max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub ssm_client: SsmClient,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

/// Deserialize one config section from `ORDER_MANAGER_*` variables
fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let mut database = DatabaseConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()))
            .load()
            .await;

        let mut dynamodb_config = aws_sdk_dynamodb::config::Builder::from(&aws_config);
        if let Some(endpoint_url) = &database.endpoint_url {
            info!("Using DynamoDB endpoint override: {}", endpoint_url);
            dynamodb_config = dynamodb_config.endpoint_url(endpoint_url);
        }
        let dynamodb_client = DynamoDbClient::from_conf(dynamodb_config.build());
        let ssm_client = SsmClient::new(&aws_config);

        let parameter_store = Arc::new(ParameterStoreConfig::new(
            ssm_client.clone(),
            Duration::from_secs(5 * 60),
        ));

        if let Some(parameter) = &database.table_name_parameter {
            database.table_name = parameter_store
                .get_parameter_with_default(parameter, &database.table_name)
                .await;
            info!("Order table name resolved to {}", database.table_name);
        }

        let config = Config {
            server,
            aws: AwsConfig {
                region: database.region.clone(),
                dynamodb_client,
                ssm_client,
                parameter_store,
            },
            database,
            observability,
        };

        config.validate()?;
        config.check_connectivity().await;

        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()
    }

    async fn check_connectivity(&self) {
        // Connectivity problems are reported but do not stop startup
        if self.database.table_name_parameter.is_none() {
            return;
        }
        match self.aws.ssm_client.describe_parameters().send().await {
            Ok(_) => info!("AWS SSM connectivity validated"),
            Err(e) => warn!("AWS SSM connectivity test failed: {}", e),
        }
    }
}

impl ServerConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("server")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Request timeout cannot be 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DatabaseConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("database")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Order table name cannot be empty".to_string(),
            });
        }
        if self.read_capacity_units < 1 || self.write_capacity_units < 1 {
            return Err(ConfigError::ValidationError {
                message: "Provisioned capacity units must be at least 1".to_string(),
            });
        }
        if self.table_poll_max_attempts == 0 {
            return Err(ConfigError::ValidationError {
                message: "Table poll attempts cannot be 0".to_string(),
            });
        }
        Ok(())
    }

    /// Definition of the orders table this configuration describes
    pub fn table_definition(&self) -> TableDefinition {
        TableDefinition::orders(
            self.table_name.clone(),
            self.read_capacity_units,
            self.write_capacity_units,
        )
    }

    pub fn table_poll_interval(&self) -> Duration {
        Duration::from_secs(self.table_poll_interval_seconds)
    }
}

impl ObservabilityConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("observability")
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        {
            let cache = self.cache.read().await;
            if let Some((value, timestamp)) = cache.get(name) {
                if timestamp.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
            }
        }

        debug!("Fetching parameter from AWS SSM: {}", name);
        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(false)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        self.cache
            .write()
            .await
            .insert(name.to_string(), (value.clone(), Instant::now()));

        Ok(value)
    }

    pub async fn get_parameter_with_default(&self, name: &str, default: &str) -> String {
        match self.get_parameter(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to get parameter {}, using default: {}", name, e);
                default.to_string()
            }
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024
}

pub(crate) fn default_table_name() -> String {
    "Order".to_string()
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_capacity_units() -> i64 {
    5
}

pub(crate) fn default_table_poll_interval() -> u64 {
    2
}

pub(crate) fn default_table_poll_max_attempts() -> u32 {
    60
}

pub(crate) fn default_service_name() -> String {
    "order-manager".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_metrics_port() -> u16 {
    9090
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
