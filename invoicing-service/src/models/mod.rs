//! Domain models for invoicing-service.

mod approval;
mod invoice;

pub use approval::{ApprovalWorkflow, Approver, ApproverAssignment, ApproverStatus};
pub use invoice::{Invoice, InvoiceDirection, InvoiceStatus, NewInvoice};
