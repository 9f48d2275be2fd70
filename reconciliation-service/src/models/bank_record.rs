//! Records decoded from bank statement and order files.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Header,
    Transaction,
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitCredit {
    Debit,
    Credit,
}

impl DebitCredit {
    pub fn from_amount(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            DebitCredit::Debit
        } else {
            DebitCredit::Credit
        }
    }
}

/// One decoded line (or XML transaction) of a bank file.
///
/// `amount` is signed: credits are zero or positive, debits negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRecord {
    pub record_type: RecordType,
    pub amount: Decimal,
    pub dc: DebitCredit,
    pub currency: String,
    pub value_date: Option<NaiveDate>,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<String>,
    pub line_number: usize,
    pub raw_line: String,
}

impl BankRecord {
    pub fn is_transaction(&self) -> bool {
        self.record_type == RecordType::Transaction
    }

    pub fn abs_amount(&self) -> Decimal {
        self.amount.abs()
    }

    /// Append complementary concept text (Norma 43 `23` records).
    pub fn append_narrative(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match self.narrative.as_mut() {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(text);
            }
            None => self.narrative = Some(text.to_string()),
        }
    }
}
