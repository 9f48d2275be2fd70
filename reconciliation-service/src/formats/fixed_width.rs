//! Generic decoder for the fixed-width layouts in [`super::layout`].

use std::iter::{Enumerate, Peekable};
use std::str::Lines;

use rust_decimal::Decimal;

use super::layout::{
    self, parse_cents, parse_date, parse_indicator, slice, slice_lenient, FieldKind,
    FormatLayout, RecordKind, RecordLayout, Role,
};
use super::{BankFormat, BankFormatHandler, DeclaredTotals, ParseError, Records};
use crate::models::{BankRecord, DebitCredit, RecordType};

pub(super) static NORMA19_HANDLER: FixedWidthHandler =
    FixedWidthHandler::new(BankFormat::Norma19, &layout::NORMA19);
pub(super) static NORMA34_HANDLER: FixedWidthHandler =
    FixedWidthHandler::new(BankFormat::Norma34, &layout::NORMA34);
pub(super) static NORMA43_HANDLER: FixedWidthHandler =
    FixedWidthHandler::new(BankFormat::Norma43, &layout::NORMA43);

pub struct FixedWidthHandler {
    format: BankFormat,
    layout: &'static FormatLayout,
}

impl FixedWidthHandler {
    pub const fn new(format: BankFormat, layout: &'static FormatLayout) -> Self {
        Self { format, layout }
    }
}

fn strip_bom(content: &str) -> &str {
    content.trim_start_matches('\u{feff}')
}

impl BankFormatHandler for FixedWidthHandler {
    fn format(&self) -> BankFormat {
        self.format
    }

    fn validate(&self, content: &str) -> Result<(), ParseError> {
        let first = strip_bom(content)
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or(ParseError::Empty {
                format: self.format,
            })?;

        if !first.starts_with(self.layout.header_prefix) {
            return Err(ParseError::Format {
                format: self.format,
                expected: self.layout.header_prefix.to_string(),
                found: first.chars().take(2).collect(),
            });
        }
        Ok(())
    }

    fn records<'a>(&self, content: &'a str) -> Result<Records<'a>, ParseError> {
        self.validate(content)?;
        Ok(Records::FixedWidth(FixedWidthRecords::new(
            self.format,
            self.layout,
            strip_bom(content),
        )))
    }
}

/// Lazily decodes one record per line, folding complementary lines into the
/// transaction they follow.
pub struct FixedWidthRecords<'a> {
    format: BankFormat,
    layout: &'static FormatLayout,
    lines: Peekable<Enumerate<Lines<'a>>>,
    currency: String,
    declared: DeclaredTotals,
    skipped: usize,
}

impl<'a> FixedWidthRecords<'a> {
    fn new(format: BankFormat, layout: &'static FormatLayout, content: &'a str) -> Self {
        Self {
            format,
            layout,
            lines: content.lines().enumerate().peekable(),
            currency: layout.default_currency.to_string(),
            declared: DeclaredTotals::default(),
            skipped: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn declared(&self) -> &DeclaredTotals {
        &self.declared
    }

    fn skip(&mut self, line_number: usize, reason: &str) {
        self.skipped += 1;
        tracing::debug!(
            format = %self.format,
            line_number,
            reason,
            "Skipping malformed line"
        );
    }

    /// Header and footer lines are decoded leniently: whatever control values
    /// they carry are kept, missing ones are ignored.
    fn decode_summary(
        &mut self,
        record: &RecordLayout,
        line: &str,
        line_number: usize,
        record_type: RecordType,
    ) -> BankRecord {
        if let Some(ccy) = text(record, line, Role::Currency).and_then(layout::currency_from_numeric)
        {
            self.currency = ccy.to_string();
        }

        let control_total = cents(record, line, Role::ControlTotal);
        if self.declared.control_total.is_none() {
            self.declared.control_total = control_total;
        }
        let debit_total = cents(record, line, Role::DebitTotal);
        let credit_total = cents(record, line, Role::CreditTotal);
        if debit_total.is_some() {
            self.declared.debit_total = debit_total;
        }
        if credit_total.is_some() {
            self.declared.credit_total = credit_total;
        }
        if let Some(count) = text(record, line, Role::RecordCount).and_then(|s| s.parse().ok()) {
            self.declared.record_count = Some(count);
        }

        let magnitude = cents(record, line, Role::Amount)
            .or(control_total)
            .or_else(|| Some(credit_total? - debit_total?))
            .unwrap_or(Decimal::ZERO);
        let dc = field_text(record, line, Role::DcKey)
            .and_then(parse_indicator)
            .unwrap_or_else(|| DebitCredit::from_amount(magnitude));
        let magnitude = magnitude.abs();

        BankRecord {
            record_type,
            amount: signed(magnitude, dc),
            dc,
            currency: self.currency.clone(),
            value_date: None,
            reference: String::new(),
            narrative: text(record, line, Role::Counterparty).map(str::to_string),
            return_code: None,
            line_number,
            raw_line: line.to_string(),
        }
    }

    /// Transactions are decoded strictly; any bad field rejects the line.
    fn decode_transaction(
        &self,
        record: &RecordLayout,
        line: &str,
        line_number: usize,
    ) -> Result<BankRecord, &'static str> {
        if line.chars().count() < record.min_len() {
            return Err("line too short");
        }
        let amount_field = record.field(Role::Amount).ok_or("layout has no amount")?;
        let raw = slice(line, amount_field.start, amount_field.end).ok_or("line too short")?;
        let amount_cents = parse_cents(raw, amount_field.kind == FieldKind::SignedCents)
            .ok_or("amount is not numeric")?;

        let indicator = field_text(record, line, Role::DcKey).and_then(parse_indicator);
        let negative = amount_cents < 0;
        let dc = match (indicator, negative) {
            (Some(DebitCredit::Credit), true) => {
                return Err("negative amount on a credit entry");
            }
            (Some(dc), _) => dc,
            (None, true) => DebitCredit::Debit,
            (None, false) => record.default_dc,
        };

        let value_date = match record.field(Role::ValueDate) {
            Some(f) => {
                let raw = slice_lenient(line, f.start, f.end).trim();
                if raw.is_empty() {
                    None
                } else {
                    Some(parse_date(raw, f.kind).ok_or("invalid value date")?)
                }
            }
            None => None,
        };

        let reference = text(record, line, Role::Reference)
            .or_else(|| text(record, line, Role::SecondaryReference))
            .unwrap_or_default()
            .to_string();

        Ok(BankRecord {
            record_type: RecordType::Transaction,
            amount: signed(Decimal::new(amount_cents.abs(), 2), dc),
            dc,
            currency: self.currency.clone(),
            value_date,
            reference,
            narrative: text(record, line, Role::Narrative).map(str::to_string),
            return_code: text(record, line, Role::ReturnCode).map(str::to_string),
            line_number,
            raw_line: line.to_string(),
        })
    }

    fn fold_complements(&mut self, record: &mut BankRecord) {
        while let Some((_, next)) = self.lines.peek() {
            let Some(complement) = self
                .layout
                .record_for(next)
                .filter(|r| r.kind == RecordKind::Complement)
            else {
                break;
            };
            if let Some(narrative) = text(complement, next, Role::Narrative) {
                record.append_narrative(narrative);
            }
            self.lines.next();
        }
    }
}

impl Iterator for FixedWidthRecords<'_> {
    type Item = BankRecord;

    fn next(&mut self) -> Option<BankRecord> {
        while let Some((index, line)) = self.lines.next() {
            let line_number = index + 1;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let Some(record) = self.layout.record_for(line) else {
                self.skip(line_number, "unknown record code");
                continue;
            };

            match record.kind {
                RecordKind::Header => {
                    return Some(self.decode_summary(record, line, line_number, RecordType::Header));
                }
                RecordKind::Footer => {
                    return Some(self.decode_summary(record, line, line_number, RecordType::Footer));
                }
                RecordKind::Transaction => match self.decode_transaction(record, line, line_number) {
                    Ok(mut decoded) => {
                        self.fold_complements(&mut decoded);
                        return Some(decoded);
                    }
                    Err(reason) => self.skip(line_number, reason),
                },
                RecordKind::Complement => {
                    self.skip(line_number, "complementary record without a movement")
                }
            }
        }
        None
    }
}

fn signed(magnitude: Decimal, dc: DebitCredit) -> Decimal {
    match dc {
        DebitCredit::Debit => -magnitude,
        DebitCredit::Credit => magnitude,
    }
}

/// Raw text of a field, possibly truncated, `None` when the layout lacks it.
fn field_text<'l>(record: &RecordLayout, line: &'l str, role: Role) -> Option<&'l str> {
    record
        .field(role)
        .map(|f| slice_lenient(line, f.start, f.end))
}

/// Trimmed non-blank text of a field.
fn text<'l>(record: &RecordLayout, line: &'l str, role: Role) -> Option<&'l str> {
    field_text(record, line, role)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn cents(record: &RecordLayout, line: &str, role: Role) -> Option<Decimal> {
    let f = record.field(role)?;
    let raw = slice(line, f.start, f.end)?;
    parse_cents(raw, f.kind == FieldKind::SignedCents).map(|c| Decimal::new(c, 2))
}
