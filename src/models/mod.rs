// Re-export all model types
pub use self::errors::*;
pub use self::order::*;
pub use self::table::*;

mod errors;
mod order;
mod table;
