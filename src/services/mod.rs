pub mod order_accessor;
pub mod request_log;

pub use order_accessor::{OrderAccessor, SOURCE_NAME};
pub use request_log::{LogManager, RequestLogger};
