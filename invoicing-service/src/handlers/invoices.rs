use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use service_core::audit::AuditTrail;
use service_core::error::AppError;
use service_core::middleware::ActorContext;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::approval::InvoiceCommand;
use crate::dtos::{CreateInvoiceRequest, DecisionRequest, InvoiceListParams, SubmitForApprovalRequest};
use crate::models::{Invoice, NewInvoice};
use crate::services::{self, InvoiceFilter};
use crate::startup::AppState;

async fn transition(
    state: &AppState,
    id: Uuid,
    command: InvoiceCommand,
    actor: &ActorContext,
) -> Result<Json<Invoice>, AppError> {
    match state
        .store
        .transition(id, command, state.clock.now(), actor)
        .await
    {
        Ok(invoice) => Ok(Json(invoice)),
        Err(e) => {
            tracing::warn!(error = %e, "Invoice transition refused");
            services::record_error(e.kind());
            Err(e)
        }
    }
}

#[instrument(skip_all, fields(number = %req.number, actor = %actor.user_id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    req.validate()?;
    if req.amount <= Decimal::ZERO {
        return Err(AppError::UnprocessableEntity(anyhow::anyhow!(
            "amount must be positive"
        )));
    }

    let input = NewInvoice {
        number: req.number.trim().to_string(),
        counterparty: req.counterparty.trim().to_string(),
        amount: req.amount,
        currency: req
            .currency
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| state.config.default_currency.clone()),
        direction: req.direction,
        due_date: req.due_date,
        description: req.description,
    };
    let invoice = state
        .store
        .insert(Invoice::new(input, state.clock.now(), &actor))
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let filter = InvoiceFilter {
        status: params.status,
        direction: params.direction,
    };
    Ok(Json(state.store.list(filter).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.store.get(id).await?))
}

pub async fn invoice_audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditTrail>, AppError> {
    Ok(Json(state.store.get(id).await?.audit_trail))
}

#[instrument(skip_all, fields(invoice_id = %id, actor = %actor.user_id))]
pub async fn submit_for_approval(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitForApprovalRequest>,
) -> Result<Json<Invoice>, AppError> {
    req.validate()?;
    if req.approvers.len() > state.config.max_approval_levels {
        return Err(AppError::UnprocessableEntity(anyhow::anyhow!(
            "at most {} approval levels are allowed",
            state.config.max_approval_levels
        )));
    }

    let approvers = req.approvers.into_iter().map(Into::into).collect();
    transition(
        &state,
        id,
        InvoiceCommand::SubmitForApproval { approvers },
        &actor,
    )
    .await
}

#[instrument(skip_all, fields(invoice_id = %id, level = level, actor = %actor.user_id))]
pub async fn approve(
    State(state): State<AppState>,
    actor: ActorContext,
    Path((id, level)): Path<(Uuid, u32)>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<Invoice>, AppError> {
    req.validate()?;
    let comments = req.comments;
    transition(&state, id, InvoiceCommand::Approve { level, comments }, &actor).await
}

#[instrument(skip_all, fields(invoice_id = %id, level = level, actor = %actor.user_id))]
pub async fn reject(
    State(state): State<AppState>,
    actor: ActorContext,
    Path((id, level)): Path<(Uuid, u32)>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<Invoice>, AppError> {
    req.validate()?;
    let comments = req.comments;
    transition(&state, id, InvoiceCommand::Reject { level, comments }, &actor).await
}

#[instrument(skip_all, fields(invoice_id = %id, actor = %actor.user_id))]
pub async fn submit(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    transition(&state, id, InvoiceCommand::Submit, &actor).await
}

#[instrument(skip_all, fields(invoice_id = %id, actor = %actor.user_id))]
pub async fn verify(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    transition(&state, id, InvoiceCommand::Verify, &actor).await
}

#[instrument(skip_all, fields(invoice_id = %id, actor = %actor.user_id))]
pub async fn send(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    transition(&state, id, InvoiceCommand::Send, &actor).await
}
