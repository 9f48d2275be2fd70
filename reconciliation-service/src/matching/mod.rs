//! Correlates parsed bank records with known payments and derives the status
//! transitions they imply.
//!
//! [`reconcile`] is pure: it returns the updated payments and their audit
//! entries without touching any store, and either computes the whole outcome
//! or fails without one.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::audit::AuditEntry;
use service_core::middleware::ActorContext;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BankRecord, DebitCredit, Payment, PaymentDirection, PaymentError, PaymentStatus, StatusChange,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("reference \"{reference}\" matches more than one payment")]
    MatchAmbiguity { reference: String },

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPayment {
    /// Payment after any transition was applied.
    pub payment: Payment,
    pub record: BankRecord,
    pub transition: Option<StatusChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentAudit {
    pub payment_id: Uuid,
    pub entry: AuditEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub matched: Vec<MatchedPayment>,
    pub updated_count: usize,
    pub unmatched: Vec<BankRecord>,
    pub duplicates: Vec<BankRecord>,
    pub audit: Vec<PaymentAudit>,
}

impl ReconciliationOutcome {
    pub fn updated_payments(&self) -> impl Iterator<Item = &Payment> {
        self.matched
            .iter()
            .filter(|m| m.transition.is_some())
            .map(|m| &m.payment)
    }
}

/// A record signals failure when the bank returned it, or when money moved
/// the opposite way to what the payment expects.
pub fn is_failure(record: &BankRecord, payment: &Payment) -> bool {
    if record.return_code.is_some() {
        return true;
    }
    matches!(
        (payment.direction, record.dc),
        (PaymentDirection::Incoming, DebitCredit::Debit)
            | (PaymentDirection::Outgoing, DebitCredit::Credit)
    )
}

fn failure_details(record: &BankRecord, payment: &Payment) -> String {
    if let Some(narrative) = record.narrative.as_deref().filter(|n| !n.is_empty()) {
        return narrative.to_string();
    }
    if let Some(code) = record.return_code.as_deref() {
        return format!("returned by bank with code {code}");
    }
    let (moved, expected) = match payment.direction {
        PaymentDirection::Incoming => ("debit", "incoming"),
        PaymentDirection::Outgoing => ("credit", "outgoing"),
    };
    format!("bank reported a {moved} for an {expected} payment")
}

/// Status a payment moves to given one matching record, if any.
fn next_status(payment: &Payment, failure: bool) -> Option<PaymentStatus> {
    match (payment.status, failure) {
        (PaymentStatus::Processed, false) => Some(PaymentStatus::Reconciled),
        (PaymentStatus::Pending | PaymentStatus::Processed, true) => Some(PaymentStatus::Failed),
        _ => None,
    }
}

pub fn reconcile(
    records: &[BankRecord],
    payments: &[Payment],
    now: DateTime<Utc>,
    actor: &ActorContext,
) -> Result<ReconciliationOutcome, ReconcileError> {
    let mut by_reference: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, payment) in payments.iter().enumerate() {
        by_reference
            .entry(payment.reference.trim())
            .or_default()
            .push(i);
    }

    let mut outcome = ReconciliationOutcome::default();
    let mut seen: HashSet<usize> = HashSet::new();

    for record in records.iter().filter(|r| r.is_transaction()) {
        let reference = record.reference.trim();
        let candidates = match by_reference.get(reference) {
            Some(c) if !reference.is_empty() => c,
            _ => {
                outcome.unmatched.push(record.clone());
                continue;
            }
        };
        let index = match candidates.as_slice() {
            [only] => *only,
            _ => {
                return Err(ReconcileError::MatchAmbiguity {
                    reference: reference.to_string(),
                });
            }
        };
        if !seen.insert(index) {
            outcome.duplicates.push(record.clone());
            continue;
        }

        let payment = &payments[index];
        if record.abs_amount() != payment.amount.abs() {
            tracing::warn!(
                payment_id = %payment.id,
                reference,
                expected = %payment.amount,
                reported = %record.abs_amount(),
                "Bank amount differs from payment amount"
            );
        }

        let failure = is_failure(record, payment);
        let Some(to) = next_status(payment, failure) else {
            outcome.matched.push(MatchedPayment {
                payment: payment.clone(),
                record: record.clone(),
                transition: None,
            });
            continue;
        };

        let details = failure.then(|| failure_details(record, payment));
        let updated = payment.transition(to, details.clone(), now)?;
        let change = StatusChange {
            from: payment.status,
            to,
        };

        let summary = match &details {
            Some(reason) => format!(
                "{} -> {} from statement line {}: {reason}",
                change.from, change.to, record.line_number
            ),
            None => format!(
                "{} -> {} from statement line {} ({} {})",
                change.from,
                change.to,
                record.line_number,
                record.abs_amount(),
                record.currency
            ),
        };
        outcome.audit.push(PaymentAudit {
            payment_id: payment.id,
            entry: AuditEntry::new(now, format!("payment_{}", to.as_str()), actor, summary, None),
        });
        outcome.updated_count += 1;
        outcome.matched.push(MatchedPayment {
            payment: updated,
            record: record.clone(),
            transition: Some(change),
        });
    }

    tracing::debug!(
        matched = outcome.matched.len(),
        updated = outcome.updated_count,
        unmatched = outcome.unmatched.len(),
        duplicates = outcome.duplicates.len(),
        "Reconciliation computed"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentType, RecordType};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn record(reference: &str, amount: Decimal) -> BankRecord {
        BankRecord {
            record_type: RecordType::Transaction,
            amount,
            dc: DebitCredit::from_amount(amount),
            currency: "EUR".into(),
            value_date: None,
            reference: reference.into(),
            narrative: None,
            return_code: None,
            line_number: 2,
            raw_line: String::new(),
        }
    }

    fn payment(reference: &str, status: PaymentStatus) -> Payment {
        let mut p = Payment::new(
            reference,
            dec!(100),
            "EUR",
            PaymentDirection::Incoming,
            PaymentType::DirectDebit,
            None,
            Utc::now(),
        );
        p.status = status;
        p
    }

    fn actor() -> ActorContext {
        ActorContext::new("u-7", Some("Tesoreria".into()))
    }

    #[test]
    fn test_processed_payment_is_reconciled() {
        let payments = vec![payment("INV-1", PaymentStatus::Processed)];
        let out = reconcile(&[record("INV-1", dec!(100))], &payments, Utc::now(), &actor())
            .unwrap();
        assert_eq!(out.updated_count, 1);
        assert_eq!(out.matched[0].payment.status, PaymentStatus::Reconciled);
        assert_eq!(out.audit.len(), 1);
        assert_eq!(out.audit[0].entry.action, "payment_reconciled");
        assert_eq!(out.audit[0].entry.actor, "Tesoreria");
    }

    #[test]
    fn test_return_code_fails_payment_with_details() {
        let payments = vec![payment("INV-1", PaymentStatus::Pending)];
        let mut r = record("INV-1", dec!(100));
        r.return_code = Some("AM04".into());
        let out = reconcile(&[r], &payments, Utc::now(), &actor()).unwrap();
        let updated = &out.matched[0].payment;
        assert_eq!(updated.status, PaymentStatus::Failed);
        assert_eq!(
            updated.error_details.as_deref(),
            Some("returned by bank with code AM04")
        );
    }

    #[test]
    fn test_opposite_direction_is_a_failure_using_narrative() {
        let payments = vec![payment("INV-1", PaymentStatus::Processed)];
        let mut r = record("INV-1", dec!(-100));
        r.narrative = Some("DEVOLUCION RECIBO".into());
        let out = reconcile(&[r], &payments, Utc::now(), &actor()).unwrap();
        assert_eq!(out.matched[0].payment.status, PaymentStatus::Failed);
        assert_eq!(
            out.matched[0].payment.error_details.as_deref(),
            Some("DEVOLUCION RECIBO")
        );
    }

    #[test]
    fn test_pending_success_matches_without_transition() {
        let payments = vec![payment("INV-1", PaymentStatus::Pending)];
        let out = reconcile(&[record("INV-1", dec!(100))], &payments, Utc::now(), &actor())
            .unwrap();
        assert_eq!(out.matched.len(), 1);
        assert!(out.matched[0].transition.is_none());
        assert_eq!(out.updated_count, 0);
        assert!(out.audit.is_empty());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let payments = vec![payment("INV-1", PaymentStatus::Processed)];
        let records = [record("INV-1", dec!(100))];
        let first = reconcile(&records, &payments, Utc::now(), &actor()).unwrap();
        let updated: Vec<Payment> = first.updated_payments().cloned().collect();

        let second = reconcile(&records, &updated, Utc::now(), &actor()).unwrap();
        assert_eq!(second.updated_count, 0);
        assert!(second.audit.is_empty());
        assert_eq!(second.matched[0].payment.status, PaymentStatus::Reconciled);
    }

    #[test]
    fn test_unknown_and_duplicate_records() {
        let payments = vec![payment("INV-1", PaymentStatus::Processed)];
        let mut header = record("INV-1", dec!(100));
        header.record_type = RecordType::Header;
        let records = [
            header,
            record("INV-1", dec!(100)),
            record("INV-1", dec!(100)),
            record("UNKNOWN", dec!(5)),
            record("   ", dec!(5)),
        ];
        let out = reconcile(&records, &payments, Utc::now(), &actor()).unwrap();
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.duplicates.len(), 1);
        assert_eq!(out.unmatched.len(), 2);
        assert_eq!(out.audit.len(), 1);
    }

    #[test]
    fn test_shared_reference_is_ambiguous() {
        let payments = vec![
            payment("INV-1", PaymentStatus::Processed),
            payment("INV-1", PaymentStatus::Processed),
        ];
        let err = reconcile(&[record("INV-1", dec!(100))], &payments, Utc::now(), &actor())
            .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::MatchAmbiguity {
                reference: "INV-1".into()
            }
        );
    }
}
