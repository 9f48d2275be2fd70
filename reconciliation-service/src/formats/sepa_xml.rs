//! Metadata extraction from SEPA direct-debit XML (pain.008).

use std::str::FromStr;

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;

use super::{BankFormat, BankFormatHandler, DeclaredTotals, ParseError, Records};
use crate::models::{BankRecord, DebitCredit, RecordType};

pub struct SepaXmlHandler;

impl BankFormatHandler for SepaXmlHandler {
    fn format(&self) -> BankFormat {
        BankFormat::Sepa
    }

    fn validate(&self, content: &str) -> Result<(), ParseError> {
        extract(content).map(|_| ())
    }

    fn records<'a>(&self, content: &'a str) -> Result<Records<'a>, ParseError> {
        let extracted = extract(content)?;
        Ok(Records::Xml(XmlRecords {
            inner: extracted.records.into_iter(),
            declared: extracted.declared,
            skipped: extracted.skipped,
        }))
    }
}

/// Records of an XML document. The document is walked eagerly because
/// group-level totals may follow the transactions they describe.
pub struct XmlRecords {
    inner: std::vec::IntoIter<BankRecord>,
    declared: DeclaredTotals,
    skipped: usize,
}

impl XmlRecords {
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn declared(&self) -> &DeclaredTotals {
        &self.declared
    }
}

impl Iterator for XmlRecords {
    type Item = BankRecord;

    fn next(&mut self) -> Option<BankRecord> {
        self.inner.next()
    }
}

struct Extracted {
    records: Vec<BankRecord>,
    declared: DeclaredTotals,
    skipped: usize,
}

#[derive(Default)]
struct PendingTx {
    index: usize,
    reference: Option<String>,
    amount: Option<Decimal>,
    currency: Option<String>,
    narrative: Option<String>,
    invalid: bool,
}

fn validation(message: impl std::fmt::Display) -> ParseError {
    ParseError::Validation {
        format: BankFormat::Sepa,
        message: message.to_string(),
    }
}

fn ends_with(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

fn check_root(name: &str) -> Result<(), ParseError> {
    if name != "Document" {
        return Err(ParseError::Format {
            format: BankFormat::Sepa,
            expected: "<Document>".to_string(),
            found: format!("<{name}>"),
        });
    }
    Ok(())
}

fn extract(content: &str) -> Result<Extracted, ParseError> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(ParseError::Empty {
            format: BankFormat::Sepa,
        });
    }

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut saw_initiation = false;
    let mut declared = DeclaredTotals::default();
    let mut collection_date: Option<NaiveDate> = None;
    let mut pending: Option<PendingTx> = None;
    let mut records = Vec::new();
    let mut skipped = 0;
    let mut tx_count = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                match name.as_str() {
                    "CstmrDrctDbtInitn" => saw_initiation = true,
                    "DrctDbtTxInf" => {
                        tx_count += 1;
                        pending = Some(PendingTx {
                            index: tx_count,
                            ..Default::default()
                        });
                    }
                    "InstdAmt" => {
                        if let Some(tx) = pending.as_mut() {
                            for attr in e.attributes().flatten() {
                                if attr.key.local_name().as_ref() == b"Ccy" {
                                    tx.currency = attr
                                        .unescape_value()
                                        .ok()
                                        .map(|v| v.trim().to_string());
                                }
                            }
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                if name == "CstmrDrctDbtInitn" {
                    saw_initiation = true;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(validation)?;
                let text = text.trim();

                if ends_with(&path, &["GrpHdr", "NbOfTxs"]) {
                    let count = text
                        .parse()
                        .map_err(|_| validation(format!("NbOfTxs is not a number: \"{text}\"")))?;
                    declared.transaction_count = Some(count);
                } else if ends_with(&path, &["GrpHdr", "CtrlSum"]) {
                    let sum = Decimal::from_str(text)
                        .map_err(|_| validation(format!("CtrlSum is not a decimal: \"{text}\"")))?;
                    declared.control_total = Some(sum);
                } else if ends_with(&path, &["PmtInf", "ReqdColltnDt"]) {
                    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
                        validation(format!("ReqdColltnDt is not an ISO date: \"{text}\""))
                    })?;
                    collection_date = Some(date);
                } else if let Some(tx) = pending.as_mut() {
                    if ends_with(&path, &["PmtId", "EndToEndId"]) {
                        tx.reference = Some(text.to_string());
                    } else if ends_with(&path, &["DrctDbtTxInf", "InstdAmt"]) {
                        match Decimal::from_str(text) {
                            Ok(amount) if amount.is_sign_positive() => tx.amount = Some(amount),
                            _ => tx.invalid = true,
                        }
                    } else if ends_with(&path, &["RmtInf", "Ustrd"]) {
                        tx.narrative = Some(text.to_string());
                    }
                }
            }
            Ok(Event::End(_)) => match path.pop().as_deref() {
                Some("DrctDbtTxInf") => {
                    if let Some(tx) = pending.take() {
                        match (tx.amount, tx.invalid) {
                            (Some(amount), false) => records.push(BankRecord {
                                record_type: RecordType::Transaction,
                                amount,
                                dc: DebitCredit::Credit,
                                currency: tx.currency.unwrap_or_else(|| "EUR".to_string()),
                                value_date: collection_date,
                                reference: tx.reference.unwrap_or_default(),
                                narrative: tx.narrative,
                                return_code: None,
                                line_number: tx.index,
                                raw_line: format!("DrctDbtTxInf[{}]", tx.index),
                            }),
                            _ => {
                                skipped += 1;
                                tracing::debug!(
                                    transaction = tx.index,
                                    "Skipping direct-debit transaction without a valid amount"
                                );
                            }
                        }
                    }
                }
                Some("PmtInf") => collection_date = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(validation(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::Format {
            format: BankFormat::Sepa,
            expected: "<Document>".to_string(),
            found: "no root element".to_string(),
        });
    }
    if !saw_initiation {
        return Err(ParseError::Format {
            format: BankFormat::Sepa,
            expected: "<CstmrDrctDbtInitn>".to_string(),
            found: "a document without a direct-debit initiation".to_string(),
        });
    }

    Ok(Extracted {
        records,
        declared,
        skipped,
    })
}
