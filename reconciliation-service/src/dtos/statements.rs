use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::formats::{BankFormat, FileMetadata, ParsedFile};
use crate::matching::PaymentAudit;
use crate::models::{BankRecord, Payment};
use crate::services::StatementRun;

/// Bank file upload. The file travels base64-encoded so the JSON body can
/// carry Latin-1 and ASCII files untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct StatementUpload {
    #[validate(length(min = 1, max = 255, message = "filename is required"))]
    pub filename: String,

    /// Detected from the filename and first record when omitted.
    pub format: Option<BankFormat>,

    /// Empty content is left to the parser, which rejects it as a format error.
    pub content_base64: String,
}

impl StatementUpload {
    pub fn decode_content(&self) -> Result<Vec<u8>, AppError> {
        STANDARD
            .decode(self.content_base64.trim())
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("content_base64 is not valid base64: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct ParsedStatementResponse {
    pub format: BankFormat,
    pub metadata: FileMetadata,
    pub records: Vec<BankRecord>,
}

impl From<ParsedFile> for ParsedStatementResponse {
    fn from(file: ParsedFile) -> Self {
        Self {
            format: file.format,
            metadata: file.metadata,
            records: file.records,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub fingerprint: String,
    pub already_processed: bool,
    pub format: BankFormat,
    pub metadata: FileMetadata,
    pub matched: usize,
    pub updated: usize,
    pub updated_payments: Vec<Payment>,
    pub unmatched: Vec<BankRecord>,
    pub duplicates: Vec<BankRecord>,
    pub audit: Vec<PaymentAudit>,
}

impl ReconciliationResponse {
    pub fn new(file: ParsedFile, run: StatementRun) -> Self {
        let updated_payments = run.outcome.updated_payments().cloned().collect();
        Self {
            fingerprint: run.fingerprint,
            already_processed: run.already_processed,
            format: file.format,
            metadata: file.metadata,
            matched: run.outcome.matched.len(),
            updated: run.outcome.updated_count,
            updated_payments,
            unmatched: run.outcome.unmatched,
            duplicates: run.outcome.duplicates,
            audit: run.outcome.audit,
        }
    }
}
