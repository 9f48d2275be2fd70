//! Payment storage.
//!
//! Every write, including a whole statement run, happens under a single lock
//! acquisition so a statement is either applied completely or not at all.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::audit::{AuditEntry, AuditTrail};
use service_core::error::AppError;
use service_core::middleware::ActorContext;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::matching::{self, ReconciliationOutcome};
use crate::models::{BankRecord, Payment, PaymentStatus};
use crate::services::metrics;

/// Hex SHA-256 of an uploaded statement.
pub fn statement_fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementRun {
    pub fingerprint: String,
    pub already_processed: bool,
    pub outcome: ReconciliationOutcome,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Store a new payment. References are unique.
    async fn insert(&self, payment: Payment, actor: &ActorContext) -> Result<Payment, AppError>;

    /// Store a batch of new payments. Any duplicate reference, against the
    /// store or within the batch, rejects the whole batch.
    async fn insert_many(
        &self,
        payments: Vec<Payment>,
        actor: &ActorContext,
    ) -> Result<Vec<Payment>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Payment, AppError>;

    async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, AppError>;

    async fn audit_trail(&self, id: Uuid) -> Result<AuditTrail, AppError>;

    /// Move a payment to `to` outside of a statement run (bank acceptance
    /// or rejection notices).
    async fn update_status(
        &self,
        id: Uuid,
        to: PaymentStatus,
        error_details: Option<String>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Payment, AppError>;

    /// Match a statement against stored payments and apply the resulting
    /// transitions. A statement already applied is reported and skipped.
    async fn reconcile_statement(
        &self,
        fingerprint: &str,
        records: &[BankRecord],
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<StatementRun, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Default)]
struct Inner {
    payments: HashMap<Uuid, Payment>,
    by_reference: HashMap<String, Uuid>,
    audit: HashMap<Uuid, AuditTrail>,
    statements: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    inner: Mutex<Inner>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("payment {} not found", id))
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    #[instrument(skip_all, fields(reference = %payment.reference))]
    async fn insert(&self, payment: Payment, actor: &ActorContext) -> Result<Payment, AppError> {
        let mut stored = self.insert_many(vec![payment], actor).await?;
        stored
            .pop()
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("payment was not stored")))
    }

    #[instrument(skip_all, fields(count = payments.len()))]
    async fn insert_many(
        &self,
        payments: Vec<Payment>,
        actor: &ActorContext,
    ) -> Result<Vec<Payment>, AppError> {
        let mut inner = self.inner.lock().await;

        let mut batch = HashSet::with_capacity(payments.len());
        for payment in &payments {
            let reference = payment.reference.trim();
            if inner.by_reference.contains_key(reference) || !batch.insert(reference) {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "a payment with reference \"{}\" already exists",
                    reference
                )));
            }
        }

        for payment in &payments {
            let reference = payment.reference.trim().to_string();
            let entry = AuditEntry::new(
                payment.created_at,
                "payment_created",
                actor,
                format!("{} {} {}", payment.amount, payment.currency, reference),
                None,
            );
            inner.by_reference.insert(reference, payment.id);
            inner.audit.entry(payment.id).or_default().push(entry);
            inner.payments.insert(payment.id, payment.clone());
            info!(payment_id = %payment.id, "Payment created");
        }
        Ok(payments)
    }

    async fn get(&self, id: Uuid) -> Result<Payment, AppError> {
        let inner = self.inner.lock().await;
        inner.payments.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, AppError> {
        let inner = self.inner.lock().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.reference.cmp(&b.reference)));
        Ok(payments)
    }

    async fn audit_trail(&self, id: Uuid) -> Result<AuditTrail, AppError> {
        let inner = self.inner.lock().await;
        if !inner.payments.contains_key(&id) {
            return Err(not_found(id));
        }
        Ok(inner.audit.get(&id).cloned().unwrap_or_default())
    }

    #[instrument(skip_all, fields(payment_id = %id, to = %to))]
    async fn update_status(
        &self,
        id: Uuid,
        to: PaymentStatus,
        error_details: Option<String>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Payment, AppError> {
        let mut inner = self.inner.lock().await;
        let current = inner.payments.get(&id).ok_or_else(|| not_found(id))?;
        let from = current.status;
        let updated = current.transition(to, error_details.clone(), now)?;

        let details = match error_details {
            Some(reason) => format!("{from} -> {to}: {reason}"),
            None => format!("{from} -> {to}"),
        };
        let entry = AuditEntry::new(now, format!("payment_{}", to.as_str()), actor, details, None);
        inner.audit.entry(id).or_default().push(entry);
        inner.payments.insert(id, updated.clone());

        metrics::record_payment_transition(from.as_str(), to.as_str());
        info!(from = %from, "Payment status updated");
        Ok(updated)
    }

    #[instrument(skip_all, fields(fingerprint = %fingerprint, records = records.len()))]
    async fn reconcile_statement(
        &self,
        fingerprint: &str,
        records: &[BankRecord],
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<StatementRun, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.statements.contains(fingerprint) {
            info!("Statement already processed, nothing applied");
            return Ok(StatementRun {
                fingerprint: fingerprint.to_string(),
                already_processed: true,
                outcome: ReconciliationOutcome::default(),
            });
        }

        let candidates: Vec<Payment> = records
            .iter()
            .filter_map(|r| inner.by_reference.get(r.reference.trim()))
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| inner.payments.get(id).cloned())
            .collect();

        let outcome = matching::reconcile(records, &candidates, now, actor)?;

        for matched in outcome.matched.iter().filter(|m| m.transition.is_some()) {
            inner
                .payments
                .insert(matched.payment.id, matched.payment.clone());
        }
        for audit in &outcome.audit {
            inner
                .audit
                .entry(audit.payment_id)
                .or_default()
                .push(audit.entry.clone());
        }
        inner.statements.insert(fingerprint.to_string());

        for change in outcome.matched.iter().filter_map(|m| m.transition) {
            metrics::record_payment_transition(change.from.as_str(), change.to.as_str());
        }
        info!(
            matched = outcome.matched.len(),
            updated = outcome.updated_count,
            unmatched = outcome.unmatched.len(),
            "Statement reconciled"
        );

        Ok(StatementRun {
            fingerprint: fingerprint.to_string(),
            already_processed: false,
            outcome,
        })
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let _inner = self.inner.lock().await;
        Ok(())
    }
}
