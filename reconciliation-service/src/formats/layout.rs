//! Declarative field layouts for the fixed-width Spanish banking formats.
//!
//! Offsets are zero-based character positions, `end` exclusive. Every
//! format is described once here and decoded by the generic line decoder in
//! `fixed_width`.

use chrono::NaiveDate;

use crate::models::DebitCredit;

/// What a field means to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Amount,
    DcKey,
    ValueDate,
    Reference,
    SecondaryReference,
    Narrative,
    ReturnCode,
    Currency,
    ControlTotal,
    DebitTotal,
    CreditTotal,
    RecordCount,
    Counterparty,
}

/// How the characters of a field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Integer cents, digits only.
    Cents,
    /// Integer cents with an optional leading sign.
    SignedCents,
    DateYyMmDd,
    DateDdMmYy,
    /// `1` debit, `2` credit; anything else means "not stated".
    DcIndicator,
    /// ISO 4217 numeric currency code.
    NumericCurrency,
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub role: Role,
    pub start: usize,
    pub end: usize,
    pub kind: FieldKind,
}

const fn field(role: Role, start: usize, end: usize, kind: FieldKind) -> Field {
    Field {
        role,
        start,
        end,
        kind,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Header,
    Transaction,
    /// Text continuing the preceding transaction.
    Complement,
    Footer,
}

#[derive(Debug)]
pub struct RecordLayout {
    pub prefix: &'static str,
    pub kind: RecordKind,
    pub fields: &'static [Field],
    /// Direction used when neither an indicator nor a sign says otherwise.
    pub default_dc: DebitCredit,
}

impl RecordLayout {
    pub fn field(&self, role: Role) -> Option<&Field> {
        self.fields.iter().find(|f| f.role == role)
    }

    /// Characters a transaction line must have for its amount to be present.
    pub fn min_len(&self) -> usize {
        self.field(Role::Amount).map(|f| f.end).unwrap_or(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Ascii,
    Latin1,
    Utf8,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Ascii => "ASCII",
            Charset::Latin1 => "Latin-1",
            Charset::Utf8 => "UTF-8",
        }
    }
}

#[derive(Debug)]
pub struct FormatLayout {
    pub header_prefix: &'static str,
    pub records: &'static [RecordLayout],
    pub default_currency: &'static str,
}

impl FormatLayout {
    pub fn record_for(&self, line: &str) -> Option<&'static RecordLayout> {
        self.records.iter().find(|r| line.starts_with(r.prefix))
    }
}

use FieldKind::*;
use Role::*;

// Norma 43: account statement, 80-character records.
pub static NORMA43: FormatLayout = FormatLayout {
    header_prefix: "11",
    default_currency: "EUR",
    records: &[
        RecordLayout {
            prefix: "11",
            kind: RecordKind::Header,
            fields: &[
                field(DcKey, 32, 33, DcIndicator),
                field(Amount, 33, 47, Cents),
                field(Currency, 47, 50, NumericCurrency),
                field(Counterparty, 51, 77, Text),
            ],
            default_dc: DebitCredit::Credit,
        },
        RecordLayout {
            prefix: "22",
            kind: RecordKind::Transaction,
            fields: &[
                field(ValueDate, 16, 22, DateYyMmDd),
                field(DcKey, 27, 28, DcIndicator),
                field(Amount, 28, 40, SignedCents),
                field(Reference, 50, 62, Text),
                field(SecondaryReference, 62, 78, Text),
            ],
            default_dc: DebitCredit::Credit,
        },
        RecordLayout {
            prefix: "23",
            kind: RecordKind::Complement,
            fields: &[field(Narrative, 4, 80, Text)],
            default_dc: DebitCredit::Credit,
        },
        RecordLayout {
            prefix: "33",
            kind: RecordKind::Footer,
            fields: &[
                field(DebitTotal, 25, 39, Cents),
                field(CreditTotal, 44, 58, Cents),
                field(DcKey, 58, 59, DcIndicator),
                field(Amount, 59, 73, Cents),
                field(Currency, 73, 76, NumericCurrency),
            ],
            default_dc: DebitCredit::Credit,
        },
        RecordLayout {
            prefix: "88",
            kind: RecordKind::Footer,
            fields: &[field(RecordCount, 20, 26, Count)],
            default_dc: DebitCredit::Credit,
        },
    ],
};

// Norma 19: direct-debit collection orders. Collections credit the presenter.
pub static NORMA19: FormatLayout = FormatLayout {
    header_prefix: "51",
    default_currency: "EUR",
    records: &[
        RecordLayout {
            prefix: "51",
            kind: RecordKind::Header,
            fields: &[
                field(Counterparty, 22, 62, Text),
                field(ControlTotal, 66, 78, Cents),
            ],
            default_dc: DebitCredit::Credit,
        },
        RecordLayout {
            prefix: "56",
            kind: RecordKind::Transaction,
            fields: &[
                field(Reference, 16, 28, Text),
                field(Counterparty, 28, 68, Text),
                field(Amount, 88, 98, Cents),
                field(ValueDate, 98, 104, DateDdMmYy),
                field(ReturnCode, 104, 108, Text),
                field(Narrative, 108, 148, Text),
            ],
            default_dc: DebitCredit::Credit,
        },
        RecordLayout {
            prefix: "59",
            kind: RecordKind::Footer,
            fields: &[
                field(Amount, 88, 98, Cents),
                field(RecordCount, 98, 108, Count),
            ],
            default_dc: DebitCredit::Credit,
        },
    ],
};

// Norma 34: transfer orders. Transfers debit the ordering account.
pub static NORMA34: FormatLayout = FormatLayout {
    header_prefix: "34",
    default_currency: "EUR",
    records: &[
        RecordLayout {
            prefix: "34",
            kind: RecordKind::Header,
            fields: &[
                field(Counterparty, 22, 62, Text),
                field(ControlTotal, 66, 78, Cents),
            ],
            default_dc: DebitCredit::Debit,
        },
        RecordLayout {
            prefix: "06",
            kind: RecordKind::Transaction,
            fields: &[
                field(Reference, 16, 28, Text),
                field(Counterparty, 28, 68, Text),
                field(Amount, 92, 104, Cents),
                field(ValueDate, 104, 110, DateDdMmYy),
                field(ReturnCode, 110, 114, Text),
                field(Narrative, 114, 149, Text),
            ],
            default_dc: DebitCredit::Debit,
        },
        RecordLayout {
            prefix: "08",
            kind: RecordKind::Footer,
            fields: &[
                field(Amount, 28, 40, Cents),
                field(RecordCount, 40, 48, Count),
            ],
            default_dc: DebitCredit::Debit,
        },
    ],
};

/// Slice `[start, end)` by characters. Lines decoded from Latin-1 may hold
/// multi-byte characters, so byte offsets cannot be used directly.
pub fn slice(line: &str, start: usize, end: usize) -> Option<&str> {
    if end <= start {
        return None;
    }
    if line.is_ascii() {
        return line.get(start..end);
    }
    let mut indices = line.char_indices().map(|(i, _)| i).chain(Some(line.len()));
    let from = indices.nth(start)?;
    let to = indices.nth(end - start - 1)?;
    line.get(from..to)
}

/// Like [`slice`] but tolerates lines truncated inside the field, which is
/// common for trailing text when editors strip padding.
pub fn slice_lenient(line: &str, start: usize, end: usize) -> &str {
    let len = line.chars().count();
    if start >= len {
        return "";
    }
    slice(line, start, end.min(len)).unwrap_or("")
}

pub fn parse_cents(raw: &str, signed: bool) -> Option<i64> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') if signed => (true, &trimmed[1..]),
        Some(b'+') if signed => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

pub fn parse_date(raw: &str, kind: FieldKind) -> Option<NaiveDate> {
    let fmt = match kind {
        DateYyMmDd => "%y%m%d",
        DateDdMmYy => "%d%m%y",
        _ => return None,
    };
    NaiveDate::parse_from_str(raw.trim(), fmt).ok()
}

pub fn parse_indicator(raw: &str) -> Option<DebitCredit> {
    match raw.trim() {
        "1" => Some(DebitCredit::Debit),
        "2" => Some(DebitCredit::Credit),
        _ => None,
    }
}

pub fn currency_from_numeric(code: &str) -> Option<&'static str> {
    let ccy = match code.trim() {
        "978" => "EUR",
        "840" => "USD",
        "826" => "GBP",
        "756" => "CHF",
        "752" => "SEK",
        "208" => "DKK",
        "578" => "NOK",
        "985" => "PLN",
        "203" => "CZK",
        "348" => "HUF",
        "946" => "RON",
        "124" => "CAD",
        "392" => "JPY",
        _ => return None,
    };
    Some(ccy)
}
