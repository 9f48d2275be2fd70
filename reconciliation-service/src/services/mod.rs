//! Services module for reconciliation-service.

pub mod metrics;
pub mod store;

pub use metrics::{
    get_metrics, init_metrics, record_error, record_matches, record_reconciliation_run,
    record_sepa_document, record_skipped_lines, record_statement_import,
};
pub use store::{statement_fingerprint, InMemoryPaymentStore, PaymentStore, StatementRun};
