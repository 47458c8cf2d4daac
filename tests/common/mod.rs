#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpListener;

use order_manager::handlers::create_order_router;
use order_manager::models::{
    Order, OrderRequest, RepositoryError, RepositoryResult, TableDefinition,
};
use order_manager::repositories::{OrderRepository, TableProvisioner};
use order_manager::services::{OrderAccessor, RequestLogger};

/// Order store kept in memory, with a switch to make every call fail
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn stored_doc(&self, order_id: &str) -> Option<String> {
        self.orders.lock().unwrap().get(order_id).cloned()
    }

    fn check(&self, operation: &str) -> RepositoryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Store {
                operation: operation.to_string(),
                code: Some("ProvisionedThroughputExceededException".to_string()),
                message: "Rate of requests exceeds the allowed throughput".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_order(&self, order_id: &str) -> RepositoryResult<Option<String>> {
        self.check("GetItem")?;
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn put_order(&self, order: &Order) -> RepositoryResult<()> {
        self.check("PutItem")?;
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order.doc.clone());
        Ok(())
    }

    async fn delete_order(&self, order_id: &str) -> RepositoryResult<()> {
        self.check("DeleteItem")?;
        self.orders.lock().unwrap().remove(order_id);
        Ok(())
    }
}

/// Provisioner that only counts how often it was asked to ensure a table
#[derive(Clone, Default)]
pub struct CountingProvisioner {
    calls: Arc<AtomicUsize>,
}

impl CountingProvisioner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableProvisioner for CountingProvisioner {
    async fn ensure_table(&self, _definition: &TableDefinition) -> RepositoryResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub order_id: String,
    pub source: String,
    pub detail: Value,
}

/// Logger that keeps every event for later assertions
#[derive(Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LoggedEvent>>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.detail["Message"].as_str().map(str::to_string))
            .collect()
    }
}

impl RequestLogger for RecordingLogger {
    fn log(&self, request: &OrderRequest, source: &str, detail: Value) {
        self.events.lock().unwrap().push(LoggedEvent {
            order_id: request.order_id.clone(),
            source: source.to_string(),
            detail,
        });
    }
}

/// Accessor wired to in-memory collaborators
pub struct TestAccessor {
    pub accessor: Arc<OrderAccessor>,
    pub repository: InMemoryOrderRepository,
    pub provisioner: CountingProvisioner,
    pub logger: RecordingLogger,
}

impl TestAccessor {
    pub fn new() -> Self {
        let repository = InMemoryOrderRepository::new();
        let provisioner = CountingProvisioner::default();
        let logger = RecordingLogger::default();

        let accessor = Arc::new(OrderAccessor::new(
            Arc::new(repository.clone()),
            Arc::new(provisioner.clone()),
            Arc::new(logger.clone()),
            TableDefinition::default(),
        ));

        Self {
            accessor,
            repository,
            provisioner,
            logger,
        }
    }
}

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub state: TestAccessor,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let state = TestAccessor::new();
        let app = create_order_router(state.accessor.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
            state,
        }
    }

    pub fn order_url(&self, order_id: &str) -> String {
        format!("{}/order/{}", self.base_url, order_id)
    }
}
