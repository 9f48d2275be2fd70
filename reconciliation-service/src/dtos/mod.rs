pub mod payments;
pub mod sepa;
pub mod statements;

pub use payments::{CreatePaymentRequest, FailPaymentRequest, PaymentListParams};
pub use sepa::{CreditTransferRequest, DirectDebitRequest, SepaDocumentResponse};
pub use statements::{ParsedStatementResponse, ReconciliationResponse, StatementUpload};
