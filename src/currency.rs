use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use crate::error::{Error, Result};

pub trait CurrencyConverter {
    fn convert(&self, amount: Decimal, from: &str, to: &str, as_of: NaiveDate) -> Result<Decimal>;
}

/// Used when no rates are configured: works as long as nothing needs converting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameCurrency;

impl CurrencyConverter for SameCurrency {
    fn convert(&self, amount: Decimal, from: &str, to: &str, as_of: NaiveDate) -> Result<Decimal> {
        if from == to {
            Ok(amount)
        } else {
            Err(Error::MissingRate {
                from: from.to_string(),
                to: to.to_string(),
                date: as_of,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateRow {
    date: NaiveDate,
    from: String,
    to: String,
    #[serde(with = "rust_decimal::serde::str")]
    rate: Decimal,
}

/// Daily exchange rates, read from a CSV file with the columns `date,from,to,rate`.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<(String, String), BTreeMap<NaiveDate, Decimal>>,
}

impl RateTable {
    pub fn load(input: impl Read) -> Result<Self> {
        let mut table = Self::default();
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
        for row in reader.deserialize() {
            let row: RateRow = row?;
            table.insert(row.date, &row.from, &row.to, row.rate);
        }
        log::info!("Loaded exchange rates for {} currency pairs", table.rates.len());
        Ok(table)
    }

    pub fn insert(&mut self, date: NaiveDate, from: &str, to: &str, rate: Decimal) {
        self.rates
            .entry((from.to_string(), to.to_string()))
            .or_default()
            .insert(date, rate);
    }

    fn latest(&self, from: &str, to: &str, as_of: NaiveDate) -> Option<Decimal> {
        self.rates
            .get(&(from.to_string(), to.to_string()))?
            .range(..=as_of)
            .next_back()
            .map(|(_, rate)| *rate)
    }
}

impl CurrencyConverter for RateTable {
    fn convert(&self, amount: Decimal, from: &str, to: &str, as_of: NaiveDate) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }
        if let Some(rate) = self.latest(from, to, as_of) {
            return Ok(amount * rate);
        }
        match self.latest(to, from, as_of) {
            Some(rate) if !rate.is_zero() => Ok(amount / rate),
            _ => Err(Error::MissingRate {
                from: from.to_string(),
                to: to.to_string(),
                date: as_of,
            }),
        }
    }
}
