//! Services module for invoicing-service.

pub mod metrics;
pub mod store;

pub use metrics::{
    get_metrics, init_metrics, record_approval_decision, record_error, record_invoice_created,
    record_transition,
};
pub use store::{InMemoryInvoiceStore, InvoiceFilter, InvoiceStore};
