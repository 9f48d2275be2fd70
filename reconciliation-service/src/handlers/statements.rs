use axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::middleware::ActorContext;
use tracing::instrument;
use validator::Validate;

use crate::dtos::{ParsedStatementResponse, ReconciliationResponse, StatementUpload};
use crate::formats::{self, ParsedFile};
use crate::services::{self, statement_fingerprint};
use crate::startup::AppState;

/// Validate, decode and parse an upload, recording import metrics.
fn load(state: &AppState, req: &StatementUpload) -> Result<(ParsedFile, String), AppError> {
    req.validate()?;
    let bytes = req.decode_content()?;
    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "file exceeds the {} byte upload limit",
            state.config.max_upload_bytes
        )));
    }

    match formats::parse_file(&req.filename, &bytes, req.format, state.clock.now()) {
        Ok(file) => {
            services::record_statement_import(file.format.name(), "parsed");
            services::record_skipped_lines(file.format.name(), file.metadata.skipped_lines);
            Ok((file, statement_fingerprint(&bytes)))
        }
        Err(e) => {
            let label = req.format.map_or("unknown", |f| f.name());
            services::record_statement_import(label, "rejected");
            tracing::warn!(filename = %req.filename, error = %e, "Bank file rejected");
            let err = AppError::from(e);
            services::record_error(err.kind());
            Err(err)
        }
    }
}

#[instrument(skip_all, fields(filename = %req.filename))]
pub async fn parse_statement(
    State(state): State<AppState>,
    Json(req): Json<StatementUpload>,
) -> Result<Json<ParsedStatementResponse>, AppError> {
    let (file, _) = load(&state, &req)?;
    Ok(Json(file.into()))
}

#[instrument(skip_all, fields(filename = %req.filename, actor = %actor.user_id))]
pub async fn reconcile_statement(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<StatementUpload>,
) -> Result<Json<ReconciliationResponse>, AppError> {
    let (file, fingerprint) = load(&state, &req)?;

    let run = state
        .store
        .reconcile_statement(&fingerprint, &file.records, state.clock.now(), &actor)
        .await
        .inspect_err(|e| {
            services::record_reconciliation_run("failed");
            services::record_error(e.kind());
        })?;

    if run.already_processed {
        services::record_reconciliation_run("duplicate");
    } else {
        services::record_reconciliation_run("applied");
        services::record_matches("matched", run.outcome.matched.len());
        services::record_matches("unmatched", run.outcome.unmatched.len());
        services::record_matches("duplicate", run.outcome.duplicates.len());
    }

    Ok(Json(ReconciliationResponse::new(file, run)))
}
