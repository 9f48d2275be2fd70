pub mod actor;
pub mod metrics;
pub mod tracing;

pub use actor::ActorContext;
