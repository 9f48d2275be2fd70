//! Mapping of domain errors onto HTTP errors.

use service_core::error::AppError;

use crate::approval::ApprovalError;

impl From<ApprovalError> for AppError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::InvalidTransition { .. } => AppError::Conflict(anyhow::Error::new(err)),
            ApprovalError::NotAssignedApprover { .. } => {
                AppError::Forbidden(anyhow::Error::new(err))
            }
            ApprovalError::NoApprovers { .. } => {
                AppError::UnprocessableEntity(anyhow::Error::new(err))
            }
        }
    }
}
