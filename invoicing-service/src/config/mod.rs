//! Configuration module for invoicing-service.

use service_core::config::{self as core_config, env_or};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub default_currency: String,
    /// Upper bound on approval levels per invoice.
    pub max_approval_levels: usize,
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let max_approval_levels = env_or("MAX_APPROVAL_LEVELS", 5usize);
        if max_approval_levels == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_APPROVAL_LEVELS must be at least 1"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "EUR".to_string()),
            max_approval_levels,
        })
    }
}
