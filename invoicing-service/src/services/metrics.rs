//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;

/// Invoice counter by direction.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoices_total",
        "Total number of invoices created by direction",
        &["direction"] // incoming, outgoing
    )
    .expect("Failed to register invoices_total")
});

/// Invoice state transitions by command and resulting status.
pub static INVOICE_TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_transitions_total",
        "Total number of invoice state transitions",
        &["action", "status"]
    )
    .expect("Failed to register transitions_total")
});

/// Approval decisions by level.
pub static APPROVAL_DECISIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_approval_decisions_total",
        "Total number of approval decisions",
        &["decision", "level"]
    )
    .expect("Failed to register approval_decisions_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Invoice amount total by currency.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_amount_total",
        "Total invoiced amount by currency",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&INVOICE_TRANSITIONS);
    Lazy::force(&APPROVAL_DECISIONS);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
}

/// Get metrics in Prometheus text format.
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

pub fn record_invoice_created(direction: &str, currency: &str, amount: Decimal) {
    INVOICES_TOTAL.with_label_values(&[direction]).inc();
    if let Some(value) = amount.to_f64() {
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[currency])
            .inc_by(value);
    }
}

pub fn record_transition(action: &str, status: &str) {
    INVOICE_TRANSITIONS.with_label_values(&[action, status]).inc();
}

pub fn record_approval_decision(decision: &str, level: u32) {
    APPROVAL_DECISIONS
        .with_label_values(&[decision, &level.to_string()])
        .inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
