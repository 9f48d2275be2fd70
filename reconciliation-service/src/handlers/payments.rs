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

use crate::dtos::{CreatePaymentRequest, FailPaymentRequest, PaymentListParams};
use crate::models::{Payment, PaymentStatus};
use crate::startup::AppState;

#[instrument(skip_all, fields(reference = %req.reference, actor = %actor.user_id))]
pub async fn create_payment(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    req.validate()?;
    if req.amount <= Decimal::ZERO {
        return Err(AppError::UnprocessableEntity(anyhow::anyhow!(
            "amount must be positive"
        )));
    }

    let payment = Payment::new(
        req.reference.trim(),
        req.amount,
        req.currency
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| state.config.default_currency.clone()),
        req.direction,
        req.payment_type,
        req.source_ref,
        state.clock.now(),
    );
    let payment = state.store.insert(payment, &actor).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PaymentListParams>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(state.store.list(params.status).await?))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.store.get(id).await?))
}

pub async fn payment_audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditTrail>, AppError> {
    Ok(Json(state.store.audit_trail(id).await?))
}

/// Bank accepted the payment.
#[instrument(skip_all, fields(payment_id = %id, actor = %actor.user_id))]
pub async fn mark_processed(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state
        .store
        .update_status(id, PaymentStatus::Processed, None, state.clock.now(), &actor)
        .await?;
    Ok(Json(payment))
}

/// Bank rejected the payment.
#[instrument(skip_all, fields(payment_id = %id, actor = %actor.user_id))]
pub async fn mark_failed(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(req): Json<FailPaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    req.validate()?;
    let payment = state
        .store
        .update_status(
            id,
            PaymentStatus::Failed,
            Some(req.reason.trim().to_string()),
            state.clock.now(),
            &actor,
        )
        .await?;
    Ok(Json(payment))
}
