use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::import::Provider;

/// Import payment processor exports into GnuCash ledgers, and prune duplicates from them.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Increase verbosity, can be given more than once
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write the resulting ledger pretty-printed
    #[arg(short, long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a CSV export into a ledger
    Import(ImportArgs),

    /// Delete transactions from a ledger
    ///
    /// A transaction is deleted if it matches every kind of filter given. With
    /// capture groups in a --match pattern, the groups form a key and only the
    /// newest transaction per key is kept, e.g. 'Unknown transaction - (\w+)'.
    /// Without groups, every match is deleted.
    Prune(PruneArgs),
}

#[derive(Debug, ClapArgs)]
pub struct ImportArgs {
    /// Payment processor the export comes from
    #[arg(long, value_enum)]
    pub provider: Provider,

    /// Field delimiter of the CSV file (defaults to the provider's)
    #[arg(short, long)]
    pub delimiter: Option<char>,

    /// Quote character of the CSV file
    #[arg(short, long, default_value_t = '"')]
    pub quote: char,

    /// Character encoding of the CSV file, utf-8 or iso-8859-1 (defaults to the provider's)
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Number format of the CSV file, us or de (defaults to the provider's)
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Currency all transactions are converted into
    #[arg(short, long, default_value = "EUR")]
    pub currency: String,

    /// CSV file with exchange rates, columns date,from,to,rate
    #[arg(short, long)]
    pub rates: Option<PathBuf>,

    /// Rule file sorting transactions into accounts, can be given more than once
    #[arg(short = 's', long = "rules")]
    pub rules: Vec<PathBuf>,

    /// UTC offset of the dates in the CSV file
    #[arg(long, default_value = "+0100", allow_hyphen_values = true)]
    pub utc_offset: String,

    /// GnuCash ledger to import into
    pub ledger: PathBuf,

    /// CSV export to import
    pub csv: PathBuf,

    /// Where to write the resulting ledger
    pub output: PathBuf,
}

#[derive(Debug, ClapArgs)]
pub struct PruneArgs {
    /// Only delete transactions with a split in this account, can be given more than once
    #[arg(short, long = "account")]
    pub accounts: Vec<String>,

    /// Date range, e.g. 2012-01-01..2012-02-01, 2012-01-01.. or ..2012-02-01
    #[arg(short, long = "date")]
    pub dates: Vec<String>,

    /// Pattern the description or a memo must start with, can be given more than once
    #[arg(short, long = "match")]
    pub matches: Vec<String>,

    /// GnuCash ledger to prune
    pub ledger: PathBuf,

    /// Where to write the resulting ledger
    pub output: PathBuf,
}

pub fn parse() -> Args {
    Args::parse()
}
