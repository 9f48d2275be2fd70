use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::models::{ApproverAssignment, InvoiceDirection, InvoiceStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 64, message = "number must be 1-64 characters"))]
    pub number: String,

    #[validate(length(min = 1, max = 200, message = "counterparty is required"))]
    pub counterparty: String,

    pub amount: Decimal,

    #[validate(length(equal = 3, message = "currency must be an ISO 4217 code"))]
    pub currency: Option<String>,

    pub direction: InvoiceDirection,

    pub due_date: Option<NaiveDate>,

    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListParams {
    pub status: Option<InvoiceStatus>,
    pub direction: Option<InvoiceDirection>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproverRequest {
    #[validate(length(min = 1, max = 128))]
    pub approver_id: Option<String>,

    #[validate(length(min = 1, max = 100, message = "approver name is required"))]
    pub name: String,
}

impl From<ApproverRequest> for ApproverAssignment {
    fn from(req: ApproverRequest) -> Self {
        ApproverAssignment {
            approver_id: req.approver_id.map(|id| id.trim().to_string()),
            name: req.name.trim().to_string(),
        }
    }
}

/// Approvers in level order; the first one signs off level 1.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitForApprovalRequest {
    #[validate(nested)]
    pub approvers: Vec<ApproverRequest>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DecisionRequest {
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub comments: Option<String>,
}
