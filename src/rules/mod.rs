//! Classification of CSV records and the handlers turning them into postings.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::accounts::AccountResolver;
use crate::builder::{Leg, TransactionBuilder};
use crate::currency::CurrencyConverter;
use crate::error::Result;
use crate::import::TransactionRecord;
use crate::ledger::{ReconcileState, Transaction};

mod config;

pub use config::{Action, BookRule, DefaultAccounts, ExchangeRule, RuleConfig, RuleFile, RuleSet};

/// What to do with a record.
#[derive(Clone, Copy)]
pub enum RuleOutcome<'r> {
    Ignore,
    MergeWithNext,
    StoreForwardReference,
    Invoke(&'r dyn Handler),
}

impl std::fmt::Debug for RuleOutcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleOutcome::Ignore => write!(f, "Ignore"),
            RuleOutcome::MergeWithNext => write!(f, "MergeWithNext"),
            RuleOutcome::StoreForwardReference => write!(f, "StoreForwardReference"),
            RuleOutcome::Invoke(handler) => write!(f, "Invoke({})", handler.name()),
        }
    }
}

/// Everything a handler needs to create a posting.
pub struct BookingContext<'a> {
    pub builder: TransactionBuilder,
    pub accounts: AccountResolver<'a>,
    pub converter: &'a dyn CurrencyConverter,
    /// Currency postings are booked in unless a handler knows better.
    pub currency: String,
}

impl BookingContext<'_> {
    /// `amount` of `record` in the booking currency.
    pub fn convert(&self, record: &TransactionRecord, amount: Decimal) -> Result<Decimal> {
        self.converter.convert(
            amount,
            &record.currency,
            &self.currency,
            record.payment_date.date_naive(),
        )
    }
}

/// Turns a record, and the records related to it, into one posting.
pub trait Handler {
    fn name(&self) -> &str;

    fn book(
        &self,
        ctx: &mut BookingContext<'_>,
        primary: &TransactionRecord,
        related: &[TransactionRecord],
    ) -> Result<Transaction>;
}

enum Rule {
    Ignore,
    MergeWithNext,
    StoreForwardReference,
    Invoke(Box<dyn Handler>),
}

/// Maps discriminants to rules. Records nobody claims go to the default handler.
pub struct RuleRegistry {
    rules: HashMap<String, Rule>,
    default: DefaultHandler,
}

impl RuleRegistry {
    pub fn new(default: DefaultHandler) -> Self {
        Self {
            rules: HashMap::new(),
            default,
        }
    }

    pub fn from_rules(rules: RuleSet, default: DefaultHandler) -> Self {
        let default = default.with_accounts(rules.default);
        let mut registry = Self::new(default);
        for (key, action) in rules.rules {
            match action {
                Action::Ignore => registry.ignore(key),
                Action::MergeWithNext => registry.merge_with_next(key),
                Action::StoreForwardReference => registry.store_forward_reference(key),
                Action::Book(rule) => {
                    let handler = BookHandler::new(key.clone(), rule);
                    registry.invoke(key, handler)
                }
                Action::Exchange(rule) => {
                    let handler = ExchangeHandler::new(key.clone(), rule);
                    registry.invoke(key, handler)
                }
            }
        }
        registry
    }

    pub fn ignore(&mut self, key: impl Into<String>) {
        self.rules.insert(key.into(), Rule::Ignore);
    }

    pub fn merge_with_next(&mut self, key: impl Into<String>) {
        self.rules.insert(key.into(), Rule::MergeWithNext);
    }

    pub fn store_forward_reference(&mut self, key: impl Into<String>) {
        self.rules.insert(key.into(), Rule::StoreForwardReference);
    }

    pub fn invoke(&mut self, key: impl Into<String>, handler: impl Handler + 'static) {
        self.rules.insert(key.into(), Rule::Invoke(Box::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify(&self, record: &TransactionRecord) -> RuleOutcome<'_> {
        match self.rules.get(&record.discriminant) {
            Some(Rule::Ignore) => RuleOutcome::Ignore,
            Some(Rule::MergeWithNext) => RuleOutcome::MergeWithNext,
            Some(Rule::StoreForwardReference) => RuleOutcome::StoreForwardReference,
            Some(Rule::Invoke(handler)) => RuleOutcome::Invoke(handler.as_ref()),
            None => {
                log::debug!("No rule for {:?}, using the default handler", record.discriminant);
                RuleOutcome::Invoke(&self.default)
            }
        }
    }

    pub fn default_handler(&self) -> &dyn Handler {
        &self.default
    }
}

/// Books unknown records between the provider's account and an imbalance account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultHandler {
    provider: String,
    account: String,
    imbalance: String,
}

impl DefaultHandler {
    pub fn new(provider: impl Into<String>, account: impl Into<String>, imbalance: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            account: account.into(),
            imbalance: imbalance.into(),
        }
    }

    fn with_accounts(self, accounts: DefaultAccounts) -> Self {
        Self {
            account: accounts.account.unwrap_or(self.account),
            imbalance: accounts.imbalance.unwrap_or(self.imbalance),
            ..self
        }
    }
}

impl Handler for DefaultHandler {
    fn name(&self) -> &str {
        "default"
    }

    fn book(
        &self,
        ctx: &mut BookingContext<'_>,
        primary: &TransactionRecord,
        related: &[TransactionRecord],
    ) -> Result<Transaction> {
        let account = ctx.accounts.resolve(&self.account, None)?;
        let imbalance = ctx.accounts.resolve(&self.imbalance, None)?;

        let mut memo = unknown_memo(primary);
        if !related.is_empty() {
            let ids: Vec<&str> = related.iter().map(|record| record.id.as_str()).collect();
            memo.push_str(&format!(" - related: {}", ids.join(", ")));
        }
        // One pair of legs per record.
        let mut legs = Vec::with_capacity(2 * (related.len() + 1));
        for (record, memo) in std::iter::once((primary, memo))
            .chain(related.iter().map(|record| (record, unknown_memo(record))))
        {
            let value = ctx.convert(record, record.net)?;
            legs.push(Leg::new(account.clone(), memo, value, ctx.currency.as_str()));
            legs.push(Leg::new(
                imbalance.clone(),
                format!("Unknown {}", self.provider),
                -value,
                ctx.currency.as_str(),
            ));
        }
        let description = format!(
            "{} {} from {} by {} - {} {}",
            self.provider, primary.description, primary.name, primary.method, primary.currency, primary.gross
        );
        ctx.builder
            .build(primary.payment_date, &ctx.currency, legs, description)
    }
}

fn unknown_memo(record: &TransactionRecord) -> String {
    format!("Unknown transaction - {} ({})", record.id, record.comment)
}

pub struct BookHandler {
    key: String,
    rule: BookRule,
}

impl BookHandler {
    pub fn new(key: impl Into<String>, rule: BookRule) -> Self {
        Self { key: key.into(), rule }
    }
}

impl Handler for BookHandler {
    fn name(&self) -> &str {
        &self.key
    }

    fn book(
        &self,
        ctx: &mut BookingContext<'_>,
        primary: &TransactionRecord,
        related: &[TransactionRecord],
    ) -> Result<Transaction> {
        let rule = &self.rule;
        let account1 = ctx.accounts.resolve(&rule.account1, rule.kind1.as_deref())?;
        let account2 = ctx.accounts.resolve(&rule.account2, rule.kind2.as_deref())?;
        let value = ctx.convert(primary, primary.amount(rule.amount))?;
        let reconciled = if rule.cleared {
            ReconcileState::Cleared
        } else {
            ReconcileState::Unreconciled
        };
        ctx.builder.two_leg(
            primary.payment_date,
            Leg::new(account1, render(&rule.memo1, primary, related), value, ctx.currency.as_str())
                .reconciled(reconciled),
            Leg::new(account2, render(&rule.memo2, primary, related), -value, ctx.currency.as_str()),
            description(&rule.description, primary, related),
        )
    }
}

/// Books a currency exchange with trading accounts for both currencies.
///
/// `account2` gives the record's amount in the record's currency, `account1`
/// receives it in the other one. The other amount comes from a related record
/// in a different currency (PayPal reports conversions as separate lines) or,
/// failing that, from the currency converter.
pub struct ExchangeHandler {
    key: String,
    rule: ExchangeRule,
}

impl ExchangeHandler {
    pub fn new(key: impl Into<String>, rule: ExchangeRule) -> Self {
        Self { key: key.into(), rule }
    }
}

impl Handler for ExchangeHandler {
    fn name(&self) -> &str {
        &self.key
    }

    fn book(
        &self,
        ctx: &mut BookingContext<'_>,
        primary: &TransactionRecord,
        related: &[TransactionRecord],
    ) -> Result<Transaction> {
        let rule = &self.rule;
        let amount1 = primary.amount(rule.amount);
        let currency1 = primary.currency.as_str();
        let (amount2, currency2) = match related
            .iter()
            .find(|record| record.currency != primary.currency)
        {
            Some(other) => {
                let amount = other.amount(rule.amount).abs();
                let amount = if amount1.is_sign_negative() { -amount } else { amount };
                (amount, other.currency.clone())
            }
            None => (ctx.convert(primary, amount1)?, ctx.currency.clone()),
        };

        let destination = ctx.accounts.resolve(&rule.account1, rule.kind1.as_deref())?;
        let destination_trading = ctx.accounts.resolve(&rule.trading1, Some("TRADING"))?;
        let source = ctx.accounts.resolve(&rule.account2, rule.kind2.as_deref())?;
        let source_trading = ctx.accounts.resolve(&rule.trading2, Some("TRADING"))?;
        ctx.builder.four_leg(
            primary.payment_date,
            (destination, render(&rule.memo1, primary, related)),
            destination_trading,
            amount2,
            &currency2,
            (source, render(&rule.memo2, primary, related)),
            source_trading,
            amount1,
            currency1,
            description(&rule.description, primary, related),
        )
    }
}

fn render(template: &Option<String>, primary: &TransactionRecord, related: &[TransactionRecord]) -> String {
    template
        .as_deref()
        .map(|template| primary.render(template, related))
        .unwrap_or_default()
}

fn description(template: &Option<String>, primary: &TransactionRecord, related: &[TransactionRecord]) -> String {
    match template {
        Some(template) => primary.render(template, related),
        None => format!("{} from {}", primary.description, primary.name),
    }
}
