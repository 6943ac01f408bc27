use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

/// Provider independent view of one CSV line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// 1-based line number in the CSV file, header excluded.
    pub line: usize,
    pub id: String,
    pub order_date: Option<DateTime<FixedOffset>>,
    pub payment_date: DateTime<FixedOffset>,
    pub status: String,
    /// Transaction type, e.g. PayPal's `Donation Received`.
    pub kind: String,
    pub name: String,
    pub gross: Decimal,
    pub fee: Decimal,
    pub net: Decimal,
    pub currency: String,
    pub method: String,
    pub brand: String,
    pub comment: String,
    pub description: String,
    pub reference: Option<String>,
    /// Key the classification rules are looked up with.
    pub discriminant: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountField {
    Gross,
    Fee,
    #[default]
    Net,
}

impl TransactionRecord {
    pub fn amount(&self, field: AmountField) -> Decimal {
        match field {
            AmountField::Gross => self.gross,
            AmountField::Fee => self.fee,
            AmountField::Net => self.net,
        }
    }

    /// Replace `{field}` placeholders in a description or memo template.
    pub fn render(&self, template: &str, related: &[TransactionRecord]) -> String {
        let related_ids = related
            .iter()
            .map(|record| record.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let amount = self.gross.to_string();
        [
            ("{id}", self.id.as_str()),
            ("{name}", self.name.as_str()),
            ("{status}", self.status.as_str()),
            ("{kind}", self.kind.as_str()),
            ("{method}", self.method.as_str()),
            ("{brand}", self.brand.as_str()),
            ("{currency}", self.currency.as_str()),
            ("{amount}", amount.as_str()),
            ("{comment}", self.comment.as_str()),
            ("{description}", self.description.as_str()),
            ("{reference}", self.reference.as_deref().unwrap_or_default()),
            ("{related}", related_ids.as_str()),
        ]
        .into_iter()
        .fold(template.to_string(), |text, (placeholder, value)| {
            text.replace(placeholder, value)
        })
    }
}
