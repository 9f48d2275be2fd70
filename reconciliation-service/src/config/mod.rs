//! Configuration module for reconciliation-service.

use service_core::config::{self as core_config, env_or};
use service_core::error::AppError;
use std::env;

use crate::sepa::{Creditor, PartyAccount};

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub default_currency: String,
    pub max_upload_bytes: usize,
    pub sepa: SepaConfig,
}

#[derive(Debug, Clone, Default)]
pub struct SepaConfig {
    /// Our own collecting account, used when a request does not name one.
    pub creditor: Option<Creditor>,
    pub initiating_party: Option<String>,
}

impl SepaConfig {
    fn from_env() -> Result<Self, AppError> {
        let name = env::var("SEPA_CREDITOR_NAME").ok();
        let iban = env::var("SEPA_CREDITOR_IBAN").ok();
        let bic = env::var("SEPA_CREDITOR_BIC").ok();
        let scheme_id = env::var("SEPA_CREDITOR_SCHEME_ID").ok();

        let creditor = match (name, iban, bic, scheme_id) {
            (Some(name), Some(iban), Some(bic), Some(scheme_id)) => Some(Creditor {
                account: PartyAccount { name, iban, bic },
                scheme_id,
            }),
            (None, None, None, None) => None,
            _ => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SEPA_CREDITOR_NAME, SEPA_CREDITOR_IBAN, SEPA_CREDITOR_BIC and SEPA_CREDITOR_SCHEME_ID must be set together"
                )));
            }
        };

        Ok(Self {
            creditor,
            initiating_party: env::var("SEPA_INITIATING_PARTY").ok(),
        })
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "reconciliation-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "EUR".to_string()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            sepa: SepaConfig::from_env()?,
        })
    }
}
