pub mod health;
pub mod payments;
pub mod sepa;
pub mod statements;

pub use health::{health_check, metrics_handler, readiness_check};
