use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone as _};
use rust_decimal::Decimal;

use super::csv::{CsvRow, Dialect, Encoding};
use super::record::TransactionRecord;
use crate::amount::{parse_amount, Locale};
use crate::error::{Error, Result};

/// Payment processors whose CSV exports we know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    Concardis,
    #[value(name = "paypal")]
    PayPal,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::Concardis => "Concardis",
            Provider::PayPal => "PayPal",
        }
    }

    /// Account unmatched transactions are booked from, and the one they are booked to.
    pub fn default_accounts(self) -> (&'static str, &'static str) {
        match self {
            Provider::Concardis => ("Concardis", "Imbalance"),
            Provider::PayPal => ("PayPal", "Imbalance"),
        }
    }

    pub fn default_dialect(self) -> Dialect {
        match self {
            Provider::Concardis => Dialect {
                delimiter: b';',
                quote: b'"',
                encoding: Encoding::Utf8,
            },
            Provider::PayPal => Dialect {
                delimiter: b'\t',
                quote: b'"',
                encoding: Encoding::Latin1,
            },
        }
    }

    pub fn default_locale(self) -> Locale {
        match self {
            Provider::Concardis => Locale::Us,
            Provider::PayPal => Locale::German,
        }
    }

    pub fn record(self, row: &CsvRow, locale: Locale, offset: FixedOffset) -> Result<TransactionRecord> {
        match self {
            Provider::Concardis => concardis_record(row, locale, offset),
            Provider::PayPal => paypal_record(row, locale, offset),
        }
    }
}

const CONCARDIS_DATE_FORMAT: &str = "%d/%m/%Y";
const PAYPAL_DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

fn concardis_record(row: &CsvRow, locale: Locale, offset: FixedOffset) -> Result<TransactionRecord> {
    let total = parse_amount(row.get("TOTAL")?, locale)?;
    let description = row.get("DESC")?.to_string();
    let method = row.get("METHOD")?.to_string();
    let brand = row.get("BRAND")?.to_string();
    Ok(TransactionRecord {
        line: row.line,
        id: row.get("REF")?.to_string(),
        order_date: Some(parse_date(row.get("ORDER")?, offset)?),
        payment_date: parse_date(row.get("PAYDATE")?, offset)?,
        status: row.get("STATUS")?.to_string(),
        kind: String::new(),
        name: cleanse(row.get("NAME")?),
        gross: total,
        fee: Decimal::ZERO,
        net: total,
        currency: row.get("CUR")?.to_string(),
        comment: row.get("TICKET")?.to_string(),
        reference: None,
        discriminant: format!("{description}{method}{brand}"),
        description,
        method,
        brand,
    })
}

fn paypal_record(row: &CsvRow, locale: Locale, offset: FixedOffset) -> Result<TransactionRecord> {
    let kind = row.get("Type")?.to_string();
    let status = row.get("Status")?.to_string();
    let timestamp = format!("{} {}", row.get("Date")?.trim(), row.get("Time")?.trim());
    let optional = |column| row.get_opt(column).unwrap_or_default().trim().to_string();
    let reference = optional("Reference Txn ID");
    let fee = match row.get_opt("Fee").map(str::trim) {
        None | Some("") | Some("...") => Decimal::ZERO,
        Some(fee) => parse_amount(fee, locale)?,
    };
    Ok(TransactionRecord {
        line: row.line,
        id: row.get("Transaction ID")?.trim().to_string(),
        order_date: None,
        payment_date: parse_datetime(&timestamp, offset)?,
        name: cleanse(row.get("Name")?),
        gross: parse_amount(row.get("Gross")?, locale)?,
        fee,
        net: parse_amount(row.get("Net")?, locale)?,
        currency: row.get("Currency")?.trim().to_string(),
        method: String::new(),
        brand: String::new(),
        comment: optional("Subject"),
        description: optional("Item Title"),
        reference: Some(reference).filter(|reference| !reference.is_empty()),
        discriminant: format!("{kind}{status}"),
        kind,
        status,
    })
}

fn parse_date(text: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(text.trim(), CONCARDIS_DATE_FORMAT).map_err(|_| {
        Error::MalformedDate {
            text: text.to_string(),
            format: CONCARDIS_DATE_FORMAT,
        }
    })?;
    local(date.and_hms_opt(0, 0, 0).unwrap_or_default(), offset, text, CONCARDIS_DATE_FORMAT)
}

fn parse_datetime(text: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let datetime = NaiveDateTime::parse_from_str(text, PAYPAL_DATE_FORMAT).map_err(|_| {
        Error::MalformedDate {
            text: text.to_string(),
            format: PAYPAL_DATE_FORMAT,
        }
    })?;
    local(datetime, offset, text, PAYPAL_DATE_FORMAT)
}

fn local(
    datetime: NaiveDateTime,
    offset: FixedOffset,
    text: &str,
    format: &'static str,
) -> Result<DateTime<FixedOffset>> {
    offset
        .from_local_datetime(&datetime)
        .single()
        .ok_or_else(|| Error::MalformedDate {
            text: text.to_string(),
            format,
        })
}

/// Exports contain the odd control character in names.
fn cleanse(name: &str) -> String {
    name.chars().filter(|c| !c.is_control()).collect()
}
