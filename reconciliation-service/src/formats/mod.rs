//! Bank file parsing: Norma 19 / 34 / 43 fixed-width files and SEPA XML.
//!
//! Each format is a variant of [`BankFormat`] and is served by a
//! [`BankFormatHandler`]. Parsing is lazy and tolerant per line: malformed
//! lines are skipped and counted, while an empty file or a file whose first
//! record does not belong to the chosen format is rejected outright.

mod fixed_width;
pub mod layout;
mod sepa_xml;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fixed_width::{FixedWidthHandler, FixedWidthRecords};
pub use layout::Charset;
pub use sepa_xml::{SepaXmlHandler, XmlRecords};

use crate::models::{BankRecord, DebitCredit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankFormat {
    Norma19,
    Norma34,
    Norma43,
    Sepa,
}

impl BankFormat {
    pub fn name(&self) -> &'static str {
        match self {
            BankFormat::Norma19 => "Norma 19",
            BankFormat::Norma34 => "Norma 34",
            BankFormat::Norma43 => "Norma 43",
            BankFormat::Sepa => "SEPA XML",
        }
    }

    pub fn charset(&self) -> Charset {
        match self {
            BankFormat::Norma19 | BankFormat::Norma34 => Charset::Ascii,
            BankFormat::Norma43 => Charset::Latin1,
            BankFormat::Sepa => Charset::Utf8,
        }
    }

    pub fn handler(&self) -> &'static dyn BankFormatHandler {
        match self {
            BankFormat::Norma19 => &fixed_width::NORMA19_HANDLER,
            BankFormat::Norma34 => &fixed_width::NORMA34_HANDLER,
            BankFormat::Norma43 => &fixed_width::NORMA43_HANDLER,
            BankFormat::Sepa => &SepaXmlHandler,
        }
    }

    /// Pick the format of an upload from its extension, sniffing the first
    /// record for `.txt` files shared by Norma 19 and Norma 34.
    pub fn detect(filename: &str, bytes: &[u8]) -> Result<Self, ParseError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "asc" | "n43" => Ok(BankFormat::Norma43),
            "xml" => Ok(BankFormat::Sepa),
            "txt" => {
                let first = bytes
                    .split(|b| *b == b'\n')
                    .map(|l| l.trim_ascii())
                    .find(|l| !l.is_empty())
                    .ok_or_else(|| ParseError::UnknownFormat {
                        filename: filename.to_string(),
                        reason: "file is empty".to_string(),
                    })?;
                if first.starts_with(b"51") {
                    Ok(BankFormat::Norma19)
                } else if first.starts_with(b"34") {
                    Ok(BankFormat::Norma34)
                } else {
                    Err(ParseError::UnknownFormat {
                        filename: filename.to_string(),
                        reason: format!(
                            "first record \"{}\" is neither a Norma 19 (\"51\") nor a Norma 34 (\"34\") header",
                            String::from_utf8_lossy(&first[..first.len().min(2)])
                        ),
                    })
                }
            }
            _ => Err(ParseError::UnknownFormat {
                filename: filename.to_string(),
                reason: "expected a .txt, .asc or .xml file".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BankFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{format} file is empty")]
    Empty { format: BankFormat },

    #[error("{format} file must start with \"{expected}\", found \"{found}\"")]
    Format {
        format: BankFormat,
        expected: String,
        found: String,
    },

    #[error("cannot determine the bank file format of \"{filename}\": {reason}")]
    UnknownFormat { filename: String, reason: String },

    #[error("{format} file failed validation: {message}")]
    Validation { format: BankFormat, message: String },

    #[error("{format} file is not valid {charset}: {message}")]
    Encoding {
        format: BankFormat,
        charset: &'static str,
        message: String,
    },
}

impl ParseError {
    /// Unrecognized or corrupt files, as opposed to structural failures
    /// inside a recognized file.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ParseError::Empty { .. } | ParseError::Format { .. } | ParseError::UnknownFormat { .. }
        )
    }
}

/// Control values a file declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredTotals {
    pub control_total: Option<Decimal>,
    pub debit_total: Option<Decimal>,
    pub credit_total: Option<Decimal>,
    pub record_count: Option<u64>,
    pub transaction_count: Option<u64>,
}

impl DeclaredTotals {
    /// Net control sum: credits minus debits when the file states both,
    /// otherwise the declared control total.
    pub fn control_sum(&self) -> Option<Decimal> {
        match (self.credit_total, self.debit_total) {
            (Some(credit), Some(debit)) => Some(credit - debit),
            _ => self.control_total,
        }
    }
}

/// Lazy record sequence produced by a handler.
pub enum Records<'a> {
    FixedWidth(FixedWidthRecords<'a>),
    Xml(XmlRecords),
}

impl Records<'_> {
    /// Lines (or XML transactions) dropped as malformed so far.
    pub fn skipped(&self) -> usize {
        match self {
            Records::FixedWidth(r) => r.skipped(),
            Records::Xml(r) => r.skipped(),
        }
    }

    /// Totals declared by the file. Complete once the iterator is exhausted.
    pub fn declared(&self) -> &DeclaredTotals {
        match self {
            Records::FixedWidth(r) => r.declared(),
            Records::Xml(r) => r.declared(),
        }
    }
}

impl Iterator for Records<'_> {
    type Item = BankRecord;

    fn next(&mut self) -> Option<BankRecord> {
        match self {
            Records::FixedWidth(r) => r.next(),
            Records::Xml(r) => r.next(),
        }
    }
}

/// Capability shared by every bank file format.
pub trait BankFormatHandler: Send + Sync {
    fn format(&self) -> BankFormat;

    /// Whole-file structural check; does not look at individual lines.
    fn validate(&self, content: &str) -> Result<(), ParseError>;

    fn records<'a>(&self, content: &'a str) -> Result<Records<'a>, ParseError>;

    fn extract_metadata(
        &self,
        content: &str,
        filename: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<FileMetadata, ParseError> {
        let mut records = self.records(content)?;
        let mut summary = Summary::default();
        for record in records.by_ref() {
            summary.add(&record);
        }
        Ok(summary.into_metadata(
            self.format(),
            filename,
            processed_at,
            records.skipped(),
            records.declared(),
        ))
    }
}

/// Parse `content` as `format`, yielding records lazily.
pub fn parse(content: &str, format: BankFormat) -> Result<Records<'_>, ParseError> {
    format.handler().records(content)
}

/// Decode raw upload bytes with the charset the format prescribes.
pub fn decode(bytes: &[u8], format: BankFormat) -> Result<String, ParseError> {
    let charset = format.charset();
    match charset {
        Charset::Ascii => {
            if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                return Err(ParseError::Encoding {
                    format,
                    charset: charset.name(),
                    message: format!("non-ASCII byte 0x{:02X} at offset {}", bytes[pos], pos),
                });
            }
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        // encoding_rs maps the Latin-1 label to windows-1252, which agrees
        // with ISO-8859-1 on every printable character.
        Charset::Latin1 => Ok(encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(bytes)
            .0
            .into_owned()),
        Charset::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| ParseError::Encoding {
                    format,
                    charset: charset.name(),
                    message: e.to_string(),
                })
        }
    }
}

/// Summary handed to the upload UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub processed_at: DateTime<Utc>,
    pub record_count: usize,
    pub total_transactions: usize,
    pub credits: usize,
    pub debits: usize,
    pub credit_total: Decimal,
    pub debit_total: Decimal,
    /// Sum of absolute transaction amounts.
    pub total_amount: Decimal,
    pub currency: String,
    pub control_sum: Option<Decimal>,
    pub declared_transactions: Option<u64>,
    pub skipped_lines: usize,
}

/// A fully parsed upload: format, decoded content, metadata and records.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedFile {
    pub format: BankFormat,
    #[serde(skip_serializing)]
    pub content: String,
    pub metadata: FileMetadata,
    pub records: Vec<BankRecord>,
}

impl ParsedFile {
    pub fn transactions(&self) -> impl Iterator<Item = &BankRecord> {
        self.records.iter().filter(|r| r.is_transaction())
    }
}

/// Decode, detect (when `format` is `None`), parse and summarize an upload.
pub fn parse_file(
    filename: &str,
    bytes: &[u8],
    format: Option<BankFormat>,
    processed_at: DateTime<Utc>,
) -> Result<ParsedFile, ParseError> {
    let format = match format {
        Some(format) => format,
        None => BankFormat::detect(filename, bytes)?,
    };
    let content = decode(bytes, format)?;

    let (records, metadata) = {
        let mut iter = parse(&content, format)?;
        let mut summary = Summary::default();
        let mut records = Vec::new();
        for record in iter.by_ref() {
            summary.add(&record);
            records.push(record);
        }
        let metadata = summary.into_metadata(
            format,
            filename,
            processed_at,
            iter.skipped(),
            iter.declared(),
        );
        (records, metadata)
    };

    tracing::info!(
        format = %format,
        filename = %filename,
        records = metadata.record_count,
        transactions = metadata.total_transactions,
        skipped = metadata.skipped_lines,
        "Bank file parsed"
    );

    Ok(ParsedFile {
        format,
        content,
        metadata,
        records,
    })
}

#[derive(Debug, Default)]
struct Summary {
    record_count: usize,
    transactions: usize,
    credits: usize,
    debits: usize,
    credit_total: Decimal,
    debit_total: Decimal,
    currency: Option<String>,
}

impl Summary {
    fn add(&mut self, record: &BankRecord) {
        self.record_count += 1;
        if self.currency.is_none() || record.is_transaction() && self.transactions == 0 {
            self.currency = Some(record.currency.clone());
        }
        if !record.is_transaction() {
            return;
        }
        self.transactions += 1;
        match record.dc {
            DebitCredit::Credit => {
                self.credits += 1;
                self.credit_total += record.abs_amount();
            }
            DebitCredit::Debit => {
                self.debits += 1;
                self.debit_total += record.abs_amount();
            }
        }
    }

    fn into_metadata(
        self,
        format: BankFormat,
        filename: &str,
        processed_at: DateTime<Utc>,
        skipped_lines: usize,
        declared: &DeclaredTotals,
    ) -> FileMetadata {
        FileMetadata {
            filename: filename.to_string(),
            processed_at,
            record_count: self.record_count,
            total_transactions: self.transactions,
            credits: self.credits,
            debits: self.debits,
            credit_total: self.credit_total,
            debit_total: self.debit_total,
            total_amount: self.credit_total + self.debit_total,
            currency: self.currency.unwrap_or_else(|| match format {
                BankFormat::Norma19 => layout::NORMA19.default_currency.to_string(),
                BankFormat::Norma34 => layout::NORMA34.default_currency.to_string(),
                BankFormat::Norma43 => layout::NORMA43.default_currency.to_string(),
                BankFormat::Sepa => "EUR".to_string(),
            }),
            control_sum: declared.control_sum(),
            declared_transactions: declared.transaction_count,
            skipped_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_detect_by_extension_and_prefix() {
        assert_eq!(
            BankFormat::detect("extracto.ASC", b"11...").unwrap(),
            BankFormat::Norma43
        );
        assert_eq!(
            BankFormat::detect("remesa.txt", b"\n5180B12345678").unwrap(),
            BankFormat::Norma19
        );
        assert_eq!(
            BankFormat::detect("transfer.txt", b"3456B12345678").unwrap(),
            BankFormat::Norma34
        );
        assert_eq!(
            BankFormat::detect("sepa.xml", b"<?xml").unwrap(),
            BankFormat::Sepa
        );
    }

    #[test]
    fn test_detect_rejects_unknown() {
        let err = BankFormat::detect("orders.txt", b"9999").unwrap_err();
        assert!(err.is_format_error());
        let err = BankFormat::detect("orders.csv", b"51").unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat { .. }));
        let err = BankFormat::detect("orders.txt", b"   \n").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_decode_ascii_rejects_high_bytes() {
        let err = decode(b"51 caf\xE9", BankFormat::Norma19).unwrap_err();
        assert!(matches!(err, ParseError::Encoding { charset: "ASCII", .. }));
    }

    #[test]
    fn test_decode_latin1() {
        let text = decode(b"23  A\xD1O", BankFormat::Norma43).unwrap();
        assert_eq!(text, "23  AÑO");
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        let text = decode(b"\xEF\xBB\xBF<Document/>", BankFormat::Sepa).unwrap();
        assert_eq!(text, "<Document/>");
        assert!(decode(b"<a>\xFF</a>", BankFormat::Sepa).is_err());
    }

    #[test]
    fn test_control_sum_prefers_net_totals() {
        let declared = DeclaredTotals {
            control_total: Some(dec!(10)),
            debit_total: Some(dec!(67.89)),
            credit_total: Some(dec!(123.45)),
            ..Default::default()
        };
        assert_eq!(declared.control_sum(), Some(dec!(55.56)));

        let declared = DeclaredTotals {
            control_total: Some(dec!(10)),
            ..Default::default()
        };
        assert_eq!(declared.control_sum(), Some(dec!(10)));
    }

    #[test]
    fn test_error_messages_name_the_format() {
        let err = ParseError::Format {
            format: BankFormat::Norma43,
            expected: "11".into(),
            found: "51".into(),
        };
        assert_eq!(
            err.to_string(),
            "Norma 43 file must start with \"11\", found \"51\""
        );
    }
}
