//! Mapping of domain errors onto HTTP errors.

use service_core::error::AppError;

use crate::formats::ParseError;
use crate::matching::ReconcileError;
use crate::models::PaymentError;
use crate::sepa::SepaError;

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        if err.is_format_error() {
            AppError::BadRequest(anyhow::Error::new(err))
        } else {
            AppError::UnprocessableEntity(anyhow::Error::new(err))
        }
    }
}

impl From<SepaError> for AppError {
    fn from(err: SepaError) -> Self {
        match err {
            SepaError::Validation(_) => AppError::UnprocessableEntity(anyhow::Error::new(err)),
            SepaError::Xml(_) => AppError::InternalError(anyhow::Error::new(err)),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::Conflict(anyhow::Error::new(err))
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        AppError::Conflict(anyhow::Error::new(err))
    }
}
