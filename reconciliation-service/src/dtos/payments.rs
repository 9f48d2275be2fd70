use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::models::{PaymentDirection, PaymentStatus, PaymentType};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, max = 35, message = "reference must be 1-35 characters"))]
    pub reference: String,

    pub amount: Decimal,

    #[validate(length(equal = 3, message = "currency must be an ISO 4217 code"))]
    pub currency: Option<String>,

    pub direction: PaymentDirection,

    pub payment_type: PaymentType,

    #[validate(length(max = 128))]
    pub source_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListParams {
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FailPaymentRequest {
    #[validate(length(min = 1, max = 500, message = "reason is required"))]
    pub reason: String,
}
