//! Invoice model for invoicing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::audit::{AuditEntry, AuditTrail};
use service_core::middleware::ActorContext;
use uuid::Uuid;

use super::ApprovalWorkflow;

/// Incoming invoices are received and go through approval; outgoing ones
/// are issued to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceDirection {
    Incoming,
    Outgoing,
}

impl InvoiceDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceDirection::Incoming => "incoming",
            InvoiceDirection::Outgoing => "outgoing",
        }
    }
}

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Submitted,
    Verified,
    Sent,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::PendingApproval => "pending_approval",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Verified => "verified",
            InvoiceStatus::Sent => "sent",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Approved | InvoiceStatus::Rejected | InvoiceStatus::Sent
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub number: String,
    pub counterparty: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: InvoiceDirection,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Invoice document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub counterparty: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: InvoiceDirection,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub approval_workflow: Option<ApprovalWorkflow>,
    pub audit_trail: AuditTrail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// New draft carrying its creation entry.
    pub fn new(input: NewInvoice, now: DateTime<Utc>, actor: &ActorContext) -> Self {
        let mut audit_trail = AuditTrail::new();
        audit_trail.push(AuditEntry::new(
            now,
            "invoice_created",
            actor,
            format!(
                "{} invoice {} for {} {}",
                input.direction.as_str(),
                input.number,
                input.amount,
                input.currency
            ),
            None,
        ));

        Self {
            id: Uuid::new_v4(),
            number: input.number,
            counterparty: input.counterparty,
            amount: input.amount,
            currency: input.currency,
            direction: input.direction,
            status: InvoiceStatus::Draft,
            due_date: input.due_date,
            description: input.description,
            approval_workflow: None,
            audit_trail,
            created_at: now,
            updated_at: now,
        }
    }
}
