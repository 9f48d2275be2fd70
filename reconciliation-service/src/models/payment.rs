//! Payment records tracked against bank activity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Payment lifecycle. `Reconciled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processed,
    Failed,
    Reconciled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Reconciled => "reconciled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Reconciled)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processed)
                | (Self::Pending, Self::Failed)
                | (Self::Processed, Self::Reconciled)
                | (Self::Processed, Self::Failed)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    DirectDebit,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment {payment_id} cannot move from {from} to {to}")]
    InvalidTransition {
        payment_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub direction: PaymentDirection,
    pub payment_type: PaymentType,
    pub source_ref: Option<String>,
    pub error_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        reference: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        direction: PaymentDirection,
        payment_type: PaymentType,
        source_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: reference.into(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            direction,
            payment_type,
            source_ref,
            error_details: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Return the payment in its next status, leaving `self` untouched.
    pub fn transition(
        &self,
        to: PaymentStatus,
        error_details: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Payment, PaymentError> {
        if !self.status.can_transition_to(to) {
            return Err(PaymentError::InvalidTransition {
                payment_id: self.id,
                from: self.status,
                to,
            });
        }

        let mut next = self.clone();
        next.status = to;
        next.updated_at = at;
        if to == PaymentStatus::Failed {
            next.error_details = error_details;
        }
        Ok(next)
    }
}
