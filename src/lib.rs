pub mod accounts;
pub mod amount;
pub mod args;
pub mod builder;
pub mod cli;
pub mod currency;
mod error;
pub mod import;
pub mod ledger;
pub mod prune;
pub mod resolve;
pub mod rules;
pub mod terminal;

pub use error::{Error, Result};
