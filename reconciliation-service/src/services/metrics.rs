//! Prometheus metrics for reconciliation-service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};
use service_core::error::AppError;

/// Counter for bank file uploads by format and outcome.
pub static STATEMENT_IMPORTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_statement_imports_total",
        "Total number of bank file imports",
        &["format", "status"]
    )
    .expect("Failed to register STATEMENT_IMPORTS")
});

/// Counter for malformed lines dropped while parsing.
pub static SKIPPED_LINES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_skipped_lines_total",
        "Total number of malformed bank file lines skipped",
        &["format"]
    )
    .expect("Failed to register SKIPPED_LINES")
});

/// Counter for reconciliation runs.
pub static RECONCILIATION_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_runs_total",
        "Total number of reconciliation runs",
        &["status"]
    )
    .expect("Failed to register RECONCILIATION_RUNS")
});

/// Counter for bank records by match result.
pub static RECORD_MATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_record_matches_total",
        "Total number of bank records by match result",
        &["result"]
    )
    .expect("Failed to register RECORD_MATCHES")
});

/// Counter for payment status transitions.
pub static PAYMENT_TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_payment_transitions_total",
        "Total number of payment status transitions",
        &["from", "to"]
    )
    .expect("Failed to register PAYMENT_TRANSITIONS")
});

/// Counter for generated SEPA documents.
pub static SEPA_DOCUMENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_sepa_documents_total",
        "Total number of SEPA documents generated",
        &["kind", "sequence_type"]
    )
    .expect("Failed to register SEPA_DOCUMENTS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&STATEMENT_IMPORTS);
    Lazy::force(&SKIPPED_LINES);
    Lazy::force(&RECONCILIATION_RUNS);
    Lazy::force(&RECORD_MATCHES);
    Lazy::force(&PAYMENT_TRANSITIONS);
    Lazy::force(&SEPA_DOCUMENTS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Metrics are not UTF-8: {}", e)))
}

pub fn record_statement_import(format: &str, status: &str) {
    STATEMENT_IMPORTS.with_label_values(&[format, status]).inc();
}

pub fn record_skipped_lines(format: &str, count: usize) {
    if count > 0 {
        SKIPPED_LINES
            .with_label_values(&[format])
            .inc_by(count as f64);
    }
}

pub fn record_reconciliation_run(status: &str) {
    RECONCILIATION_RUNS.with_label_values(&[status]).inc();
}

pub fn record_matches(result: &str, count: usize) {
    if count > 0 {
        RECORD_MATCHES
            .with_label_values(&[result])
            .inc_by(count as f64);
    }
}

pub fn record_payment_transition(from: &str, to: &str) {
    PAYMENT_TRANSITIONS.with_label_values(&[from, to]).inc();
}

pub fn record_sepa_document(kind: &str, sequence_type: &str) {
    SEPA_DOCUMENTS.with_label_values(&[kind, sequence_type]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
