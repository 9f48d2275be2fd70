use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::sepa::{
    CreditTransferPayment, Creditor, DirectDebitPayment, PartyAccount, SepaDocument,
    SequenceType,
};

#[derive(Debug, Deserialize, Validate)]
pub struct DirectDebitRequest {
    /// Falls back to the configured creditor.
    pub creditor: Option<Creditor>,
    pub debtor: PartyAccount,
    pub payment: DirectDebitPayment,

    #[validate(range(min = 1, max = 120, message = "installments must be between 1 and 120"))]
    pub installments: Option<u32>,

    /// Track each generated collection as a pending incoming payment.
    #[serde(default)]
    pub register_payments: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreditTransferRequest {
    /// Ordering account; falls back to the configured creditor account.
    pub debtor: Option<PartyAccount>,
    pub creditor: PartyAccount,
    pub payment: CreditTransferPayment,

    #[serde(default)]
    pub register_payment: bool,
}

#[derive(Debug, Serialize)]
pub struct SepaDocumentResponse {
    pub filename: String,
    pub message_id: String,
    pub end_to_end_id: String,
    pub sequence_type: Option<SequenceType>,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub xml: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
}

impl SepaDocumentResponse {
    pub fn new(document: SepaDocument, payment_id: Option<Uuid>) -> Self {
        let ins = document.instruction;
        Self {
            filename: document.filename,
            message_id: ins.message_id,
            end_to_end_id: ins.end_to_end_id,
            sequence_type: ins.sequence_type,
            due_date: ins.due_date,
            amount: ins.amount,
            currency: ins.currency,
            xml: document.xml,
            payment_id,
        }
    }
}
