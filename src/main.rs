use anyhow::Context;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use order_manager::{
    handlers::create_app,
    init_observability,
    observability::{metrics_handler, Metrics, ObservabilitySettings},
    repositories::{DynamoDbOrderRepository, TableManager},
    services::{LogManager, OrderAccessor},
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment()
        .await
        .context("failed to load configuration")?;
    println!("Configuration loaded successfully");

    init_observability(&ObservabilitySettings {
        service_name: &config.observability.service_name,
        service_version: &config.observability.service_version,
        otlp_endpoint: config.observability.otlp_endpoint.as_deref(),
        log_level: &config.observability.log_level,
        enable_json_logging: config.observability.enable_json_logging,
    })?;

    info!("Starting order-manager service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!("DynamoDB order table: {}", config.database.table_name);

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());

    let table_manager = Arc::new(TableManager::with_polling(
        dynamodb_client.clone(),
        config.database.table_poll_interval(),
        config.database.table_poll_max_attempts,
    ));

    let order_repository = Arc::new(DynamoDbOrderRepository::new(
        dynamodb_client,
        config.database.table_name.clone(),
        config.database.region.clone(),
    ));

    let accessor = Arc::new(OrderAccessor::new_with_metrics(
        order_repository,
        table_manager,
        Arc::new(LogManager::new(config.observability.service_name.clone())),
        config.database.table_definition(),
        metrics.clone(),
    ));
    info!("Order accessor initialized successfully");

    let app = create_app(metrics.clone(), accessor, &config.server);

    if config.observability.metrics_port != config.server.port {
        let metrics_addr =
            SocketAddr::new(config.server.host.parse()?, config.observability.metrics_port);
        let metrics_listener = TcpListener::bind(metrics_addr)
            .await
            .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
        let metrics_app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(metrics);
        info!("Metrics listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
                warn!("Metrics server stopped: {}", e);
            }
        });
    }

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}
