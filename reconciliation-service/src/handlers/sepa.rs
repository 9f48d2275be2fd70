use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use service_core::middleware::ActorContext;
use tracing::instrument;
use validator::Validate;

use crate::dtos::{CreditTransferRequest, DirectDebitRequest, SepaDocumentResponse};
use crate::models::{Payment, PaymentDirection, PaymentType};
use crate::sepa::{SepaDocument, SepaError};
use crate::services;
use crate::startup::AppState;

fn missing_default(what: &str) -> AppError {
    AppError::UnprocessableEntity(anyhow::anyhow!(
        "{} not provided and no SEPA creditor is configured",
        what
    ))
}

/// Pending payment tracking a generated document by its EndToEndId, so the
/// bank statement reporting it can be reconciled later.
fn pending_payment(
    state: &AppState,
    document: &SepaDocument,
    direction: PaymentDirection,
    payment_type: PaymentType,
) -> Payment {
    let ins = &document.instruction;
    Payment::new(
        ins.end_to_end_id.clone(),
        ins.amount,
        ins.currency.clone(),
        direction,
        payment_type,
        Some(ins.message_id.clone()),
        state.clock.now(),
    )
}

fn sepa_error(err: SepaError) -> AppError {
    services::record_error("sepa");
    AppError::from(err)
}

#[instrument(skip_all, fields(reference = %req.payment.reference, actor = %actor.user_id))]
pub async fn create_direct_debits(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<DirectDebitRequest>,
) -> Result<(StatusCode, Json<Vec<SepaDocumentResponse>>), AppError> {
    req.validate()?;
    let creditor = req
        .creditor
        .as_ref()
        .or(state.config.sepa.creditor.as_ref())
        .ok_or_else(|| missing_default("creditor"))?;

    let documents = match req.installments {
        Some(count) => state
            .sepa
            .generate_installments(creditor, &req.debtor, &req.payment, count),
        None => state
            .sepa
            .direct_debit(creditor, &req.debtor, &req.payment)
            .map(|d| vec![d]),
    }
    .map_err(sepa_error)?;

    for document in &documents {
        let sequence = document
            .instruction
            .sequence_type
            .as_ref()
            .map_or("OOFF", |s| s.as_str());
        services::record_sepa_document("direct_debit", sequence);
    }

    // all installments are registered or none are
    let payment_ids = if req.register_payments {
        let payments = documents
            .iter()
            .map(|d| {
                pending_payment(&state, d, PaymentDirection::Incoming, PaymentType::DirectDebit)
            })
            .collect();
        let stored = state.store.insert_many(payments, &actor).await?;
        stored.into_iter().map(|p| Some(p.id)).collect::<Vec<_>>()
    } else {
        vec![None; documents.len()]
    };

    let responses: Vec<SepaDocumentResponse> = documents
        .into_iter()
        .zip(payment_ids)
        .map(|(document, payment_id)| SepaDocumentResponse::new(document, payment_id))
        .collect();

    Ok((StatusCode::CREATED, Json(responses)))
}

#[instrument(skip_all, fields(reference = %req.payment.reference, actor = %actor.user_id))]
pub async fn create_credit_transfer(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<CreditTransferRequest>,
) -> Result<(StatusCode, Json<SepaDocumentResponse>), AppError> {
    req.validate()?;
    let debtor = req
        .debtor
        .as_ref()
        .or(state.config.sepa.creditor.as_ref().map(|c| &c.account))
        .ok_or_else(|| missing_default("debtor"))?;

    let document = state
        .sepa
        .generate_credit_transfer(debtor, &req.creditor, &req.payment)
        .map_err(sepa_error)?;
    services::record_sepa_document("credit_transfer", "none");

    let payment_id = if req.register_payment {
        let payment = pending_payment(
            &state,
            &document,
            PaymentDirection::Outgoing,
            PaymentType::Transfer,
        );
        let payment = state.store.insert(payment, &actor).await?;
        Some(payment.id)
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(SepaDocumentResponse::new(document, payment_id)),
    ))
}
