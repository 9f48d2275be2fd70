pub mod health;
pub mod invoices;

pub use health::{health_check, metrics_handler, readiness_check};
