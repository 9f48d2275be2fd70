//! Domain models for reconciliation-service.

mod bank_record;
mod payment;

pub use bank_record::{BankRecord, DebitCredit, RecordType};
pub use payment::{
    Payment, PaymentDirection, PaymentError, PaymentStatus, PaymentType, StatusChange,
};
