use serde::{Deserialize, Serialize};

use super::order::ORDER_ID_ATTRIBUTE;

/// Definition of a table keyed by a single string hash key with fixed
/// provisioned throughput
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table_name: String,
    pub hash_key: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl TableDefinition {
    /// Orders table: hash key `OrderId`, the given name and capacities
    pub fn orders(
        table_name: impl Into<String>,
        read_capacity_units: i64,
        write_capacity_units: i64,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            hash_key: ORDER_ID_ATTRIBUTE.to_string(),
            read_capacity_units,
            write_capacity_units,
        }
    }
}

impl Default for TableDefinition {
    fn default() -> Self {
        Self::orders("Order", 5, 5)
    }
}
