//! Deleting transactions from a ledger, mostly duplicates left by repeated imports.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ledger::{AccountId, Transaction};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive, possibly open ended, range of posting dates: `a..b`, `a..` or `..b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| from <= date) && self.to.map_or(true, |to| date <= to)
    }
}

impl FromStr for DateRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDateRange(s.to_string());
        let (from, to) = s.split_once("..").ok_or_else(invalid)?;
        let parse = |date: &str| match date {
            "" => Ok(None),
            date => NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map(Some)
                .map_err(|_| invalid()),
        };
        let range = DateRange {
            from: parse(from)?,
            to: parse(to)?,
        };
        if range.from.is_none() && range.to.is_none() {
            return Err(invalid());
        }
        Ok(range)
    }
}

/// Which transactions to delete. Every non-empty category must match.
#[derive(Debug, Default)]
pub struct PruneFilter {
    /// At least one split must be booked on one of these.
    pub accounts: HashSet<AccountId>,
    /// The posting date must be in one of these.
    pub dates: Vec<DateRange>,
    /// The description or a split memo must match one of these, at the start.
    ///
    /// Capture groups make a key: of all transactions with the same key only
    /// the newest survives. Without groups every match is deleted.
    pub patterns: Vec<Regex>,
}

impl PruneFilter {
    /// Compile `patterns` so they only match at the start of the text.
    pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
        patterns
            .iter()
            .map(|pattern| Ok(Regex::new(&format!("^(?:{})", pattern.as_ref()))?))
            .collect()
    }

    fn matches_account(&self, transaction: &Transaction) -> bool {
        self.accounts.is_empty()
            || transaction
                .splits
                .iter()
                .any(|split| self.accounts.contains(&split.account))
    }

    fn matches_date(&self, transaction: &Transaction) -> bool {
        let date = transaction.date_posted.naive_local().date();
        self.dates.is_empty() || self.dates.iter().any(|range| range.contains(date))
    }

    /// The dedup key of the first pattern that matches, `None` if none does.
    fn match_key(&self, transaction: &Transaction) -> Option<String> {
        let texts: Vec<&str> = std::iter::once(transaction.description.as_str())
            .chain(transaction.splits.iter().map(|split| split.memo.as_str()))
            .collect();
        self.patterns.iter().find_map(|pattern| {
            texts.iter().find_map(|text| {
                pattern.captures(text).map(|captures| {
                    captures
                        .iter()
                        .skip(1)
                        .flatten()
                        .map(|group| group.as_str())
                        .collect::<String>()
                })
            })
        })
    }
}

/// Delete the transactions matching `filter`, newest first. Returns them in that order.
pub fn prune(transactions: &mut Vec<Transaction>, filter: &PruneFilter) -> Vec<Transaction> {
    let mut seen_keys = HashSet::new();
    let mut deleted = Vec::new();
    for index in (0..transactions.len()).rev() {
        let transaction = &transactions[index];
        if !filter.matches_account(transaction) || !filter.matches_date(transaction) {
            continue;
        }
        if !filter.patterns.is_empty() {
            let Some(key) = filter.match_key(transaction) else {
                continue;
            };
            if !key.is_empty() && seen_keys.insert(key) {
                continue;
            }
        }
        let transaction = transactions.remove(index);
        log::info!("Deleting transaction {:?}", transaction.description);
        deleted.push(transaction);
    }
    deleted
}
