use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::amount::to_ledger_rational;
use crate::error::{Error, Result};
use crate::ledger::{AccountId, ReconcileState, Split, SplitId, Transaction, TransactionId};

/// One side of a posting before it becomes a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub account: AccountId,
    pub memo: String,
    pub amount: Decimal,
    pub currency: String,
    pub reconciled: ReconcileState,
}

impl Leg {
    pub fn new(
        account: AccountId,
        memo: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account,
            memo: memo.into(),
            amount,
            currency: currency.into(),
            reconciled: ReconcileState::Unreconciled,
        }
    }

    pub fn reconciled(mut self, state: ReconcileState) -> Self {
        self.reconciled = state;
        self
    }
}

/// Creates new ledger transactions for one run.
///
/// All transactions of a run share the same "date entered".
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    entered: DateTime<FixedOffset>,
}

impl TransactionBuilder {
    pub fn new(entered: DateTime<FixedOffset>) -> Self {
        Self { entered }
    }

    pub fn entered(&self) -> DateTime<FixedOffset> {
        self.entered
    }

    pub fn build(
        &self,
        date: DateTime<FixedOffset>,
        currency: &str,
        legs: Vec<Leg>,
        description: impl Into<String>,
    ) -> Result<Transaction> {
        check_balanced(&legs)?;
        let splits = legs
            .into_iter()
            .map(|leg| {
                let value = to_ledger_rational(leg.amount)?;
                Ok(Split {
                    id: SplitId(new_guid()),
                    memo: leg.memo,
                    reconciled: leg.reconciled,
                    value,
                    quantity: value,
                    account: leg.account,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Transaction::new(
            TransactionId(new_guid()),
            currency.to_string(),
            date,
            self.entered,
            description.into(),
            splits,
        ))
    }

    /// `account1` receives `amount`, `account2` gives it.
    pub fn two_leg(
        &self,
        date: DateTime<FixedOffset>,
        account1: Leg,
        account2: Leg,
        description: impl Into<String>,
    ) -> Result<Transaction> {
        let currency = account1.currency.clone();
        self.build(date, &currency, vec![account1, account2], description)
    }

    /// Foreign exchange posting. `source` gives `amount1` in its currency, `destination`
    /// receives `amount2` in another one; the trading accounts balance each currency.
    #[allow(clippy::too_many_arguments)]
    pub fn four_leg(
        &self,
        date: DateTime<FixedOffset>,
        destination: (AccountId, String),
        destination_trading: AccountId,
        amount2: Decimal,
        currency2: &str,
        source: (AccountId, String),
        source_trading: AccountId,
        amount1: Decimal,
        currency1: &str,
        description: impl Into<String>,
    ) -> Result<Transaction> {
        let legs = vec![
            Leg::new(destination.0, destination.1, amount2, currency2),
            Leg::new(destination_trading, "", -amount2, currency2),
            Leg::new(source_trading, "", amount1, currency1),
            Leg::new(source.0, source.1, -amount1, currency1),
        ];
        self.build(date, currency2, legs, description)
    }
}

/// Legs must sum up to zero in every currency.
pub fn check_balanced(legs: &[Leg]) -> Result<()> {
    let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
    for leg in legs {
        *sums.entry(leg.currency.as_str()).or_default() += leg.amount;
    }
    match sums.into_iter().find(|(_, sum)| !sum.is_zero()) {
        Some((currency, sum)) => Err(Error::UnbalancedCurrency {
            currency: currency.to_string(),
            sum,
        }),
        None => Ok(()),
    }
}

fn new_guid() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use std::collections::HashMap;

    use super::*;
    use crate::amount::Rational;

    fn time(day: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2012, 1, day, 10, 0, 0)
            .unwrap()
    }

    fn id(id: &str) -> AccountId {
        AccountId(id.to_string())
    }

    /// Sums of split values per currency, with the currency taken from `currencies`.
    fn sums(transaction: &Transaction, currencies: &HashMap<AccountId, &str>) -> HashMap<String, (i128, i128)> {
        let mut sums: HashMap<String, (i128, i128)> = HashMap::new();
        for split in &transaction.splits {
            let sum = sums
                .entry(currencies[&split.account].to_string())
                .or_insert((0, 1));
            let (n, d) = (split.value.numerator() as i128, split.value.denominator() as i128);
            *sum = (sum.0 * d + n * sum.1, sum.1 * d);
        }
        sums
    }

    #[test]
    fn two_leg_posting() {
        let builder = TransactionBuilder::new(time(20));
        let transaction = builder
            .two_leg(
                time(3),
                Leg::new(id("bank"), "from foo", Decimal::new(123456, 2), "EUR")
                    .reconciled(ReconcileState::Cleared),
                Leg::new(id("income"), "to bar", Decimal::new(-123456, 2), "EUR"),
                "Donation",
            )
            .unwrap();

        assert_eq!("EUR", transaction.currency);
        assert_eq!(time(3), transaction.date_posted);
        assert_eq!(time(20), transaction.date_entered);
        assert_eq!("Donation", transaction.description);
        assert_eq!(2, transaction.splits.len());
        assert_eq!("30864/25", transaction.splits[0].value.to_string());
        assert_eq!("-30864/25", transaction.splits[1].value.to_string());
        assert_eq!(ReconcileState::Cleared, transaction.splits[0].reconciled);
        assert_eq!(ReconcileState::Unreconciled, transaction.splits[1].reconciled);
        for split in &transaction.splits {
            assert_eq!(split.value, split.quantity);
        }
        assert_eq!(32, transaction.id.0.len());
        assert_ne!(transaction.splits[0].id, transaction.splits[1].id);
    }

    #[test]
    fn four_leg_posting_balances_per_currency() {
        let builder = TransactionBuilder::new(time(20));
        let transaction = builder
            .four_leg(
                time(3),
                (id("paypal"), "converted".to_string()),
                id("trading-eur"),
                Decimal::new(8712, 2),
                "EUR",
                (id("donations-usd"), "donation".to_string()),
                id("trading-usd"),
                Decimal::new(10033, 2),
                "USD",
                "Donation in USD",
            )
            .unwrap();

        assert_eq!("EUR", transaction.currency);
        assert_eq!(4, transaction.splits.len());
        let currencies: HashMap<AccountId, &str> = [
            (id("paypal"), "EUR"),
            (id("trading-eur"), "EUR"),
            (id("donations-usd"), "USD"),
            (id("trading-usd"), "USD"),
        ]
        .into_iter()
        .collect();
        for (currency, (numerator, _)) in sums(&transaction, &currencies) {
            assert_eq!(0, numerator, "{currency} does not balance");
        }
        assert_eq!(Rational::new(2178, 25).unwrap(), transaction.splits[0].value);
        assert_eq!(id("donations-usd"), transaction.splits[3].account);
    }

    #[test]
    fn unbalanced_legs_are_rejected() {
        let builder = TransactionBuilder::new(time(20));
        let result = builder.build(
            time(3),
            "EUR",
            vec![
                Leg::new(id("a"), "", Decimal::new(100, 2), "EUR"),
                Leg::new(id("b"), "", Decimal::new(-100, 2), "USD"),
            ],
            "broken",
        );
        assert!(matches!(
            result,
            Err(Error::UnbalancedCurrency { currency, sum }) if currency == "EUR" && sum == Decimal::new(100, 2)
        ));
    }

    #[test]
    fn generated_postings_always_balance() {
        let builder = TransactionBuilder::new(time(20));
        let amounts = ["0.01", "1234.5678", "99.999", "0.0004", "100000", "3.14159"];
        for amount in amounts {
            let amount: Decimal = amount.parse().unwrap();
            let transaction = builder
                .two_leg(
                    time(1),
                    Leg::new(id("a"), "", amount, "EUR"),
                    Leg::new(id("b"), "", -amount, "EUR"),
                    "",
                )
                .unwrap();
            let currencies: HashMap<AccountId, &str> =
                [(id("a"), "EUR"), (id("b"), "EUR")].into_iter().collect();
            assert_eq!(0, sums(&transaction, &currencies)["EUR"].0, "{amount}");
        }
    }

    #[test]
    fn every_run_shares_the_entered_date() {
        let builder = TransactionBuilder::new(time(20));
        let legs = || {
            vec![
                Leg::new(id("a"), "", Decimal::ONE, "EUR"),
                Leg::new(id("b"), "", -Decimal::ONE, "EUR"),
            ]
        };
        let first = builder.build(time(1), "EUR", legs(), "").unwrap();
        let second = builder.build(time(2), "EUR", legs(), "").unwrap();
        assert_eq!(first.date_entered, second.date_entered);
        assert_ne!(first.id, second.id);
    }
}
