//! SEPA document generation: direct debits (pain.008.001.02) and credit
//! transfers (pain.001.001.03).
//!
//! Generation is pure apart from the injected clock used for message ids.

mod credit_transfer;
mod direct_debit;
mod writer;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::clock::SharedClock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SepaError {
    #[error("invalid SEPA input: {0}")]
    Validation(String),

    #[error("failed to write SEPA XML: {0}")]
    Xml(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SequenceType {
    Frst,
    Rcur,
    Ooff,
}

impl SequenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceType::Frst => "FRST",
            SequenceType::Rcur => "RCUR",
            SequenceType::Ooff => "OOFF",
        }
    }

    /// First installment opens the mandate, later ones recur.
    pub fn for_installment(installment: Option<Installment>) -> Self {
        match installment {
            None => SequenceType::Ooff,
            Some(i) if i.number == 1 => SequenceType::Frst,
            Some(_) => SequenceType::Rcur,
        }
    }
}

/// Name, IBAN and BIC of one side of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAccount {
    pub name: String,
    pub iban: String,
    pub bic: String,
}

impl PartyAccount {
    fn normalized(&self) -> PartyAccount {
        PartyAccount {
            name: self.name.trim().to_string(),
            iban: normalize_iban(&self.iban),
            bic: self.bic.trim().to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creditor {
    #[serde(flatten)]
    pub account: PartyAccount,
    /// SEPA creditor identifier, e.g. `ES12ZZZ12345678`.
    pub scheme_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectDebitPayment {
    /// Payment reference; becomes the EndToEndId.
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub mandate_ref: String,
    pub mandate_signed_on: NaiveDate,
    pub remittance_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransferPayment {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub execution_date: NaiveDate,
    pub remittance_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub number: u32,
    pub of: u32,
}

/// Everything written into one generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepaInstruction {
    pub message_id: String,
    pub payment_info_id: String,
    pub end_to_end_id: String,
    pub payment_reference: String,
    pub sequence_type: Option<SequenceType>,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub mandate_ref: Option<String>,
    pub debtor_account: PartyAccount,
    pub creditor_account: PartyAccount,
    pub installment: Option<Installment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepaDocument {
    pub filename: String,
    pub instruction: SepaInstruction,
    pub xml: String,
}

/// Builds SEPA documents, stamping ids from the injected clock.
#[derive(Clone)]
pub struct SepaGenerator {
    clock: SharedClock,
    initiating_party: Option<String>,
}

impl SepaGenerator {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            initiating_party: None,
        }
    }

    /// Name written to `InitgPty`; defaults to the paying or collecting party.
    pub fn with_initiating_party(mut self, name: impl Into<String>) -> Self {
        self.initiating_party = Some(name.into());
        self
    }

    fn message_ids(&self, suffix: Option<u32>) -> (String, String, DateTime<Utc>) {
        let now = self.clock.now();
        let stamp = now.format("%Y%m%d%H%M%S%3f").to_string();
        match suffix {
            Some(n) => (format!("MSG-{stamp}-{n}"), format!("PMT-{stamp}-{n}"), now),
            None => (format!("MSG-{stamp}"), format!("PMT-{stamp}"), now),
        }
    }
}

static IBAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{11,30}$").expect("valid IBAN regex"));
static BIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{4}[A-Z]{2}[A-Z0-9]{2}([A-Z0-9]{3})?$").expect("valid BIC regex")
});
static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid currency regex"));

pub fn normalize_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// ISO 13616 check: move the first four characters to the end, map letters
/// to numbers and require the result mod 97 to equal 1.
fn iban_checksum_ok(iban: &str) -> bool {
    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut rem: u32 = 0;
    for c in rearranged {
        let Some(v) = c.to_digit(36) else {
            return false;
        };
        rem = if v < 10 {
            (rem * 10 + v) % 97
        } else {
            (rem * 100 + v) % 97
        };
    }
    rem == 1
}

fn invalid(msg: impl Into<String>) -> SepaError {
    SepaError::Validation(msg.into())
}

pub fn validate_iban(iban: &str) -> Result<(), SepaError> {
    let iban = normalize_iban(iban);
    if !IBAN_RE.is_match(&iban) || !iban_checksum_ok(&iban) {
        return Err(invalid(format!("IBAN \"{iban}\" is not valid")));
    }
    Ok(())
}

pub fn validate_bic(bic: &str) -> Result<(), SepaError> {
    let bic = bic.trim().to_ascii_uppercase();
    if !BIC_RE.is_match(&bic) {
        return Err(invalid(format!("BIC \"{bic}\" is not valid")));
    }
    Ok(())
}

fn validate_account(role: &str, account: &PartyAccount) -> Result<(), SepaError> {
    if account.name.trim().is_empty() {
        return Err(invalid(format!("{role} name is required")));
    }
    validate_iban(&account.iban)?;
    validate_bic(&account.bic)
}

fn validate_money(reference: &str, amount: Decimal, currency: &str) -> Result<(), SepaError> {
    if reference.trim().is_empty() {
        return Err(invalid("payment reference is required"));
    }
    if reference.trim().chars().count() > 35 {
        return Err(invalid("payment reference exceeds 35 characters"));
    }
    if amount <= Decimal::ZERO {
        return Err(invalid(format!("amount must be positive, got {amount}")));
    }
    if amount.normalize().scale() > 2 {
        return Err(invalid(format!(
            "amount {amount} has more than two decimal places"
        )));
    }
    if !CURRENCY_RE.is_match(currency) {
        return Err(invalid(format!("currency \"{currency}\" is not an ISO 4217 code")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;
    use service_core::clock::FixedClock;
    use std::sync::Arc;

    pub fn clock() -> SharedClock {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 12, 20, 10, 30, 0).unwrap(),
        ))
    }

    pub fn creditor() -> Creditor {
        Creditor {
            account: PartyAccount {
                name: "Fundacion Ejemplo".into(),
                iban: "ES91 2100 0418 4502 0005 1332".into(),
                bic: "CAIXESBBXXX".into(),
            },
            scheme_id: "ES12ZZZ12345678".into(),
        }
    }

    pub fn debtor() -> PartyAccount {
        PartyAccount {
            name: "Maria Lopez".into(),
            iban: "DE89370400440532013000".into(),
            bic: "COBADEFFXXX".into(),
        }
    }
}
