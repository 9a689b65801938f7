pub mod config_handlers;
pub mod health_handlers;
pub mod report_handlers;
pub mod scan_handlers;

pub use health_handlers::{health_check, liveness_check};
