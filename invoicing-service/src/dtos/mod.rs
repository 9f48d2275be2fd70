pub mod invoices;

pub use invoices::{
    ApproverRequest, CreateInvoiceRequest, DecisionRequest, InvoiceListParams,
    SubmitForApprovalRequest,
};
