mod book;
mod file;
mod xml;

pub use book::{
    Account, AccountId, Book, ReconcileState, Split, SplitId, Transaction, TransactionId,
    TIMESTAMP_FORMAT,
};
pub use file::{load, save};
pub use xml::{Document, Element, Node};

#[cfg(test)]
pub(crate) use book::testutils;
