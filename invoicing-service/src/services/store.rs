//! Invoice storage.
//!
//! Transitions read, validate and write under one lock acquisition, so two
//! concurrent decisions on the same level cannot both succeed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use service_core::middleware::ActorContext;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::approval::InvoiceCommand;
use crate::models::{Invoice, InvoiceDirection, InvoiceStatus};
use crate::services::metrics;

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub direction: Option<InvoiceDirection>,
}

impl InvoiceFilter {
    fn matches(&self, invoice: &Invoice) -> bool {
        self.status.map_or(true, |s| invoice.status == s)
            && self.direction.map_or(true, |d| invoice.direction == d)
    }
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Store a new invoice. Numbers are unique per direction.
    async fn insert(&self, invoice: Invoice) -> Result<Invoice, AppError>;

    async fn get(&self, id: Uuid) -> Result<Invoice, AppError>;

    async fn list(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, AppError>;

    /// Apply `command` to the stored invoice. Nothing is written on error.
    async fn transition(
        &self,
        id: Uuid,
        command: InvoiceCommand,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Default)]
struct Inner {
    invoices: HashMap<Uuid, Invoice>,
    by_number: HashMap<(InvoiceDirection, String), Uuid>,
}

#[derive(Default)]
pub struct InMemoryInvoiceStore {
    inner: Mutex<Inner>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("invoice {} not found", id))
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    #[instrument(skip_all, fields(number = %invoice.number, direction = invoice.direction.as_str()))]
    async fn insert(&self, invoice: Invoice) -> Result<Invoice, AppError> {
        let mut inner = self.inner.lock().await;
        let key = (invoice.direction, invoice.number.clone());
        if inner.by_number.contains_key(&key) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "{} invoice \"{}\" already exists",
                invoice.direction.as_str(),
                invoice.number
            )));
        }

        inner.by_number.insert(key, invoice.id);
        inner.invoices.insert(invoice.id, invoice.clone());

        metrics::record_invoice_created(
            invoice.direction.as_str(),
            &invoice.currency,
            invoice.amount,
        );
        info!(invoice_id = %invoice.id, "Invoice created");
        Ok(invoice)
    }

    async fn get(&self, id: Uuid) -> Result<Invoice, AppError> {
        let inner = self.inner.lock().await;
        inner.invoices.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn list(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let inner = self.inner.lock().await;
        let mut invoices: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.number.cmp(&b.number)));
        Ok(invoices)
    }

    #[instrument(skip_all, fields(invoice_id = %id, action = command.name()))]
    async fn transition(
        &self,
        id: Uuid,
        command: InvoiceCommand,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, AppError> {
        let mut inner = self.inner.lock().await;
        let current = inner.invoices.get(&id).ok_or_else(|| not_found(id))?;
        let action = command.name();
        let decision = match &command {
            InvoiceCommand::Approve { level, .. } => Some(("approved", *level)),
            InvoiceCommand::Reject { level, .. } => Some(("rejected", *level)),
            _ => None,
        };

        let from = current.status;
        let updated = current.apply(command, now, actor)?;
        inner.invoices.insert(id, updated.clone());

        metrics::record_transition(action, updated.status.as_str());
        if let Some((decision, level)) = decision {
            metrics::record_approval_decision(decision, level);
        }
        info!(from = %from, to = %updated.status, "Invoice transitioned");
        Ok(updated)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let _inner = self.inner.lock().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApproverAssignment, NewInvoice};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn new_invoice(number: &str) -> Invoice {
        Invoice::new(
            NewInvoice {
                number: number.into(),
                counterparty: "Papeleria Norte".into(),
                amount: dec!(300.00),
                currency: "EUR".into(),
                direction: InvoiceDirection::Incoming,
                due_date: None,
                description: None,
            },
            Utc::now(),
            &ActorContext::system(),
        )
    }

    fn one_level() -> InvoiceCommand {
        InvoiceCommand::SubmitForApproval {
            approvers: vec![ApproverAssignment {
                approver_id: None,
                name: "Director".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let store = InMemoryInvoiceStore::new();
        store.insert(new_invoice("FR-1")).await.unwrap();
        let err = store.insert(new_invoice("FR-1")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_transition_writes_nothing() {
        let store = InMemoryInvoiceStore::new();
        let actor = ActorContext::system();
        let invoice = store.insert(new_invoice("FR-2")).await.unwrap();

        let err = store
            .transition(
                invoice.id,
                InvoiceCommand::Approve {
                    level: 1,
                    comments: None,
                },
                Utc::now(),
                &actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.get(invoice.id).await.unwrap(), invoice);
    }

    #[tokio::test]
    async fn test_concurrent_decisions_on_one_level() {
        let store = Arc::new(InMemoryInvoiceStore::new());
        let actor = ActorContext::system();
        let invoice = store.insert(new_invoice("FR-3")).await.unwrap();
        store
            .transition(invoice.id, one_level(), Utc::now(), &actor)
            .await
            .unwrap();

        let approve = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .transition(
                        invoice.id,
                        InvoiceCommand::Approve {
                            level: 1,
                            comments: None,
                        },
                        Utc::now(),
                        &ActorContext::new("a", None),
                    )
                    .await
            })
        };
        let reject = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .transition(
                        invoice.id,
                        InvoiceCommand::Reject {
                            level: 1,
                            comments: None,
                        },
                        Utc::now(),
                        &ActorContext::new("b", None),
                    )
                    .await
            })
        };

        let results = [approve.await.unwrap(), reject.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

        let stored = store.get(invoice.id).await.unwrap();
        assert_eq!(stored.audit_trail.len(), 3);
        assert!(stored.status.is_terminal());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = InMemoryInvoiceStore::new();
        let actor = ActorContext::system();
        let a = store.insert(new_invoice("FR-4")).await.unwrap();
        store.insert(new_invoice("FR-5")).await.unwrap();
        store
            .transition(a.id, one_level(), Utc::now(), &actor)
            .await
            .unwrap();

        let pending = store
            .list(InvoiceFilter {
                status: Some(InvoiceStatus::PendingApproval),
                direction: None,
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].number, "FR-4");
        assert_eq!(store.list(InvoiceFilter::default()).await.unwrap().len(), 2);
    }
}
