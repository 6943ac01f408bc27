use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, FixedOffset};
use console::{style, StyledObject};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use crate::accounts::AccountResolver;
use crate::amount::Locale;
use crate::args::{Args, Command, ImportArgs, PruneArgs};
use crate::currency::{CurrencyConverter, RateTable, SameCurrency};
use crate::import::{self, Dialect, ImportOptions};
use crate::ledger::{self, Book, Transaction};
use crate::prune::{prune, DateRange, PruneFilter};
use crate::rules::{DefaultHandler, RuleRegistry, RuleSet};
use crate::terminal::BulletPointPrinter;

pub fn main(args: Args) -> Result<()> {
    match args.command {
        Command::Import(import) => main_import(import, args.pretty),
        Command::Prune(prune) => main_prune(prune, args.pretty),
    }
}

fn main_import(args: ImportArgs, pretty: bool) -> Result<()> {
    let provider = args.provider;
    let default_dialect = provider.default_dialect();
    let dialect = Dialect {
        delimiter: match args.delimiter {
            Some(delimiter) => ascii(delimiter, "delimiter")?,
            None => default_dialect.delimiter,
        },
        quote: ascii(args.quote, "quote character")?,
        encoding: match &args.encoding {
            Some(encoding) => encoding.parse()?,
            None => default_dialect.encoding,
        },
    };
    let locale: Locale = match &args.locale {
        Some(locale) => locale.parse()?,
        None => provider.default_locale(),
    };
    let offset = parse_utc_offset(&args.utc_offset)?;

    let rules = RuleSet::load(&args.rules).context("Failed to load rules")?;
    let (account, imbalance) = provider.default_accounts();
    let registry = RuleRegistry::from_rules(rules, DefaultHandler::new(provider.label(), account, imbalance));
    log::info!("Using {} rules", registry.len());

    let converter: Box<dyn CurrencyConverter> = match &args.rates {
        Some(path) => Box::new(
            RateTable::load(open(path)?)
                .with_context(|| format!("Failed to load exchange rates from {}", path.display()))?,
        ),
        None => Box::new(SameCurrency),
    };

    let mut book = load_ledger(&args.ledger)?;
    let records = import::read_records(open(&args.csv)?, provider, dialect, locale, offset)
        .with_context(|| format!("Failed to read {}", args.csv.display()))?;
    log::info!("Read {} records from {}", records.len(), args.csv.display());

    let options = ImportOptions {
        currency: args.currency,
        entered: chrono::Local::now().fixed_offset(),
    };
    let summary = import::import(&mut book, records, &registry, converter.as_ref(), &options)
        .context("Import failed")?;
    save_ledger(&book, &args.output, pretty)?;

    println!(
        "{}",
        style_header(&format!(
            "Imported {} transactions from {} records:",
            summary.booked.len(),
            summary.records
        ))
    );
    BulletPointPrinter::new_stdout().print_items(
        summary.booked.iter().map(|description| style_description(description)),
        style("(none)").italic(),
    );
    Ok(())
}

fn main_prune(args: PruneArgs, pretty: bool) -> Result<()> {
    if args.accounts.is_empty() && args.dates.is_empty() && args.matches.is_empty() {
        bail!("Give at least one --account, --date or --match filter");
    }
    let dates = args
        .dates
        .iter()
        .map(|range| range.parse::<DateRange>())
        .collect::<Result<Vec<_>, _>>()?;
    let patterns = PruneFilter::compile_patterns(&args.matches)?;

    let mut book = load_ledger(&args.ledger)?;
    let mut resolver = AccountResolver::new(&book.accounts);
    let accounts = args
        .accounts
        .iter()
        .map(|name| resolver.resolve(name, None))
        .collect::<Result<HashSet<_>, _>>()?;
    let filter = PruneFilter {
        accounts,
        dates,
        patterns,
    };

    log::info!("Attempting to prune {} transactions", book.transactions.len());
    let deleted = prune(&mut book.transactions, &filter);
    save_ledger(&book, &args.output, pretty)?;

    println!("{}", style_header(&format!("Deleted {} transactions:", deleted.len())));
    BulletPointPrinter::new_stdout().print_items(
        deleted.iter().map(style_transaction),
        style("(none)").italic(),
    );
    Ok(())
}

fn load_ledger(path: &Path) -> Result<Book> {
    ledger::load(path).with_context(|| format!("Failed to load ledger {}", path.display()))
}

fn save_ledger(book: &Book, path: &Path, pretty: bool) -> Result<()> {
    ledger::save(book, path, pretty).with_context(|| format!("Failed to write ledger {}", path.display()))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn ascii(character: char, what: &str) -> Result<u8> {
    if character.is_ascii() {
        Ok(character as u8)
    } else {
        Err(anyhow!("The {what} must be an ASCII character, got {character:?}"))
    }
}

/// `+0100` or `+01:00`.
fn parse_utc_offset(text: &str) -> Result<FixedOffset> {
    let date = DateTime::parse_from_str(&format!("2000-01-01 00:00:00 {text}"), "%Y-%m-%d %H:%M:%S %z")
        .with_context(|| format!("Invalid UTC offset {text:?}"))?;
    Ok(*date.offset())
}

fn style_header(header: &str) -> StyledObject<&str> {
    style(header).bold().underlined()
}

fn style_description(description: &str) -> StyledObject<&str> {
    style(description).blue()
}

fn style_transaction(transaction: &Transaction) -> String {
    format!(
        "{} {}",
        style(transaction.date_posted.format("%Y-%m-%d")).yellow(),
        style_description(&transaction.description)
    )
}
