// Repositories module - data access layer

pub mod order_repository;
pub mod table_manager;


pub use order_repository::{DynamoDbOrderRepository, OrderRepository};
pub use table_manager::{TableManager, TableProvisioner};
