pub mod app;
pub mod health;
pub mod order;

pub use app::create_app;
pub use health::*;
pub use order::*;
