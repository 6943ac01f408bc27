use thiserror::Error;

/// Everything that can go wrong while importing into or pruning a ledger.
///
/// All of these abort the run. The binary maps them to exit status 1.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed amount: {text:?}")]
    MalformedAmount { text: String },

    #[error("Malformed date: {text:?} (expected format {format})")]
    MalformedDate { text: String, format: &'static str },

    #[error("Did not find account with name {name:?}{} in current book", kind_suffix(.kind))]
    AccountNotFound { name: String, kind: Option<String> },

    #[error("Conflicting merge at transaction {id:?}: {reason}")]
    ConflictingMerge { id: String, reason: &'static str },

    #[error("Legs in currency {currency} do not balance, they sum up to {sum}")]
    UnbalancedCurrency {
        currency: String,
        sum: rust_decimal::Decimal,
    },

    #[error("Unrecognized element {element:?} at {location}")]
    SchemaValidation { element: String, location: String },

    #[error("Missing column {column:?} in line {line}")]
    MissingColumn { column: String, line: usize },

    #[error("No exchange rate from {from} to {to} on or before {date}")]
    MissingRate {
        from: String,
        to: String,
        date: chrono::NaiveDate,
    },

    #[error("Invalid date predicate given: {0:?}")]
    InvalidDateRange(String),

    #[error("Unknown locale {0:?}, expected one of: us, de")]
    InvalidLocale(String),

    #[error("Unsupported encoding {0:?}, expected one of: utf-8, iso-8859-1")]
    InvalidEncoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid match pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid rule file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Error in rule {key:?}: {reason}")]
    InvalidRule { key: String, reason: &'static str },
}

fn kind_suffix(kind: &Option<String>) -> String {
    kind.as_ref()
        .map(|kind| format!(" and kind {kind:?}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
