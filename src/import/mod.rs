//! Reading payment processor exports and booking them into a ledger.

use chrono::{DateTime, FixedOffset};
use std::io::Read;

use crate::accounts::AccountResolver;
use crate::amount::Locale;
use crate::builder::TransactionBuilder;
use crate::currency::CurrencyConverter;
use crate::error::Result;
use crate::ledger::Book;
use crate::resolve::{Booking, ReferenceResolver};
use crate::rules::{BookingContext, RuleRegistry};

mod csv;
mod provider;
mod record;

pub use self::csv::{read_rows, CsvRow, Dialect, Encoding};
pub use provider::Provider;
pub use record::{AmountField, TransactionRecord};

#[cfg(test)]
pub(crate) use record::testutils;

/// Parse a whole export into records, in file order.
pub fn read_records(
    input: impl Read,
    provider: Provider,
    dialect: Dialect,
    locale: Locale,
    offset: FixedOffset,
) -> Result<Vec<TransactionRecord>> {
    read_rows(input, dialect)?
        .iter()
        .map(|row| provider.record(row, locale, offset))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Currency the postings are booked in.
    pub currency: String,
    /// "Date entered" of every new transaction.
    pub entered: DateTime<FixedOffset>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
    /// Descriptions of the new transactions, in the order they were added.
    pub booked: Vec<String>,
}

/// Run `records` through the rules and append the resulting transactions to `book`.
pub fn import(
    book: &mut Book,
    records: Vec<TransactionRecord>,
    registry: &RuleRegistry,
    converter: &dyn CurrencyConverter,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let mut ctx = BookingContext {
        builder: TransactionBuilder::new(options.entered),
        accounts: AccountResolver::new(&book.accounts),
        converter,
        currency: options.currency.clone(),
    };
    let transactions = &mut book.transactions;
    let mut resolver = ReferenceResolver::new(registry);
    let mut summary = ImportSummary {
        records: records.len(),
        booked: vec![],
    };

    let mut book_one = |booking: Booking<'_>| -> Result<()> {
        let transaction = booking
            .handler
            .book(&mut ctx, &booking.primary, &booking.related)?;
        log::info!(
            "Line {}: booked {} with {} ({} related): {}",
            booking.primary.line,
            booking.primary.id,
            booking.handler.name(),
            booking.related.len(),
            transaction.description
        );
        summary.booked.push(transaction.description.clone());
        transactions.push(transaction);
        Ok(())
    };

    for record in records {
        if let Some(booking) = resolver.push(record)? {
            book_one(booking)?;
        }
    }
    for booking in resolver.finish() {
        book_one(booking)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use rust_decimal::Decimal;

    use super::testutils::{record, referencing};
    use super::*;
    use crate::currency::SameCurrency;
    use crate::error::Error;
    use crate::ledger::testutils::{sample_book, timestamp};
    use crate::ledger::AccountId;
    use crate::rules::{BookHandler, BookRule, DefaultHandler};

    fn options() -> ImportOptions {
        ImportOptions {
            currency: "EUR".to_string(),
            entered: timestamp("2012-02-01 10:00:00 +0100"),
        }
    }

    fn registry() -> RuleRegistry {
        let mut registry = RuleRegistry::new(DefaultHandler::new("Concardis", "Concardis", "Imbalance"));
        registry.invoke(
            "donation",
            BookHandler::new(
                "donation",
                BookRule {
                    account1: "Concardis".to_string(),
                    kind1: None,
                    account2: "Donations".to_string(),
                    kind2: Some("INCOME".to_string()),
                    description: Some("Donation {id}".to_string()),
                    memo1: None,
                    memo2: None,
                    amount: AmountField::Net,
                    cleared: false,
                },
            ),
        );
        registry.store_forward_reference("conversion");
        registry.ignore("noise");
        registry
    }

    #[test]
    fn appends_booked_transactions() {
        let mut book = sample_book();
        let summary = import(
            &mut book,
            vec![
                record(1, "A", "donation"),
                record(2, "B", "noise"),
                referencing(3, "C", "conversion", "Z"),
                record(4, "D", "who knows"),
            ],
            &registry(),
            &SameCurrency,
            &options(),
        )
        .unwrap();

        assert_eq!(4, summary.records);
        assert_eq!(
            vec![
                "Donation A".to_string(),
                "Concardis Donations from Jane Doe by CreditCard - EUR 10.00".to_string(),
                "Concardis Donations from Jane Doe by CreditCard - EUR 10.00".to_string(),
            ],
            summary.booked
        );
        assert_eq!(4, book.transactions.len());
        let new = &book.transactions[1..];
        assert_eq!(AccountId("000000000000000000000000000000a3".to_string()), new[0].splits[1].account);
        // the leftover group comes last
        assert_eq!("Unknown transaction - C (ticket)", new[2].splits[0].memo);
        for transaction in new {
            assert_eq!(options().entered, transaction.date_entered);
        }
    }

    #[test]
    fn every_leftover_amount_reaches_the_ledger() {
        let mut book = sample_book();
        let summary = import(
            &mut book,
            vec![
                TransactionRecord {
                    net: Decimal::new(1000, 2),
                    ..referencing(1, "B", "conversion", "X")
                },
                TransactionRecord {
                    net: Decimal::new(2500, 2),
                    ..referencing(2, "C", "conversion", "X")
                },
            ],
            &registry(),
            &SameCurrency,
            &options(),
        )
        .unwrap();

        assert_eq!(1, summary.booked.len());
        let leftover = &book.transactions[1];
        let values: Vec<String> = leftover
            .splits
            .iter()
            .map(|split| split.value.to_string())
            .collect();
        assert_eq!(vec!["10/1", "-10/1", "25/1", "-25/1"], values);
        assert_eq!("Unknown transaction - C (ticket)", leftover.splits[2].memo);
    }

    #[test]
    fn merged_record_amount_is_booked_by_default_handler() {
        let mut registry = registry();
        registry.merge_with_next("merge");
        let mut book = sample_book();
        import(
            &mut book,
            vec![
                TransactionRecord {
                    net: Decimal::new(-150, 2),
                    ..record(1, "F", "merge")
                },
                record(2, "P", "who knows"),
            ],
            &registry,
            &SameCurrency,
            &options(),
        )
        .unwrap();

        let values: Vec<String> = book.transactions[1]
            .splits
            .iter()
            .map(|split| split.value.to_string())
            .collect();
        assert_eq!(vec!["10/1", "-10/1", "-3/2", "3/2"], values);
    }

    #[test]
    fn conflicting_merge_aborts() {
        let mut registry = registry();
        registry.merge_with_next("merge");
        let mut book = sample_book();
        let result = import(
            &mut book,
            vec![record(1, "A", "merge"), record(2, "B", "merge")],
            &registry,
            &SameCurrency,
            &options(),
        );
        assert!(matches!(result, Err(Error::ConflictingMerge { .. })));
    }

    #[test]
    fn read_concardis_export() {
        let export = "REF;ORDER;PAYDATE;STATUS;NAME;TOTAL;CUR;METHOD;BRAND;TICKET;DESC\n\
                      1001;30/12/2011;02/01/2012;9;Jane Doe;-1,234.50;EUR;CreditCard;VISA;T1;Donations\n";
        let offset = FixedOffset::east_opt(3600).unwrap();
        let records = read_records(
            export.as_bytes(),
            Provider::Concardis,
            Provider::Concardis.default_dialect(),
            Provider::Concardis.default_locale(),
            offset,
        )
        .unwrap();
        assert_eq!(1, records.len());
        assert_eq!(Decimal::new(-123450, 2), records[0].net);
        assert_eq!(offset.with_ymd_and_hms(2012, 1, 2, 0, 0, 0).unwrap(), records[0].payment_date);
    }

    #[test]
    fn malformed_amount_aborts_reading() {
        let export = "REF;ORDER;PAYDATE;STATUS;NAME;TOTAL;CUR;METHOD;BRAND;TICKET;DESC\n\
                      1001;30/12/2011;02/01/2012;9;Jane Doe;1.2.3;EUR;CreditCard;VISA;T1;Donations\n";
        let result = read_records(
            export.as_bytes(),
            Provider::Concardis,
            Provider::Concardis.default_dialect(),
            Locale::Us,
            FixedOffset::east_opt(0).unwrap(),
        );
        assert!(matches!(result, Err(Error::MalformedAmount { .. })));
    }
}
