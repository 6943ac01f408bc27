use chrono::{DateTime, FixedOffset};

use super::xml::{Document, Element, Node};
use crate::amount::Rational;
use crate::error::{Error, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

const BOOK: &str = "gnc:book";
const ACCOUNT: &str = "gnc:account";
const TRANSACTION: &str = "gnc:transaction";
const COUNT_DATA: &str = "gnc:count-data";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// GnuCash account type, e.g. `ASSET`, `INCOME`, `TRADING`.
    pub kind: String,
    pub commodity: Option<String>,
    pub parent: Option<AccountId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileState {
    #[default]
    Unreconciled,
    Cleared,
    Reconciled,
}

impl ReconcileState {
    fn as_str(self) -> &'static str {
        match self {
            ReconcileState::Unreconciled => "n",
            ReconcileState::Cleared => "c",
            ReconcileState::Reconciled => "y",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "n" => Some(ReconcileState::Unreconciled),
            "c" => Some(ReconcileState::Cleared),
            "y" => Some(ReconcileState::Reconciled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub id: SplitId,
    pub memo: String,
    pub reconciled: ReconcileState,
    pub value: Rational,
    pub quantity: Rational,
    pub account: AccountId,
}

/// A balanced double-entry posting, `gnc:transaction` in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub currency: String,
    pub date_posted: DateTime<FixedOffset>,
    pub date_entered: DateTime<FixedOffset>,
    pub description: String,
    pub splits: Vec<Split>,
    // Set for transactions read from a file, they are written back unchanged.
    source: Option<Element>,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        currency: String,
        date_posted: DateTime<FixedOffset>,
        date_entered: DateTime<FixedOffset>,
        description: String,
        splits: Vec<Split>,
    ) -> Self {
        Self {
            id,
            currency,
            date_posted,
            date_entered,
            description,
            splits,
            source: None,
        }
    }
}

/// A GnuCash book: the accounts and transactions of a `gnc-v2` document.
///
/// Everything else in the document is kept as is. Transactions are written back at
/// the place the first transaction was found (or after the last account).
#[derive(Debug, Clone)]
pub struct Book {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    document: Document,
    // path of child indices from the root to the gnc:book element
    book_path: Vec<usize>,
    transaction_slot: usize,
}

impl Book {
    pub fn from_document(mut document: Document) -> Result<Self> {
        let book_path = find_book(&document.root).ok_or_else(|| Error::SchemaValidation {
            element: BOOK.to_string(),
            location: document.root.name.clone(),
        })?;
        let book = element_at_mut(&mut document.root, &book_path);

        let mut accounts = Vec::new();
        let mut transactions = Vec::new();
        let mut transaction_slot = None;
        let mut remaining = Vec::with_capacity(book.children.len());
        for node in std::mem::take(&mut book.children) {
            match node {
                Node::Element(element) if element.name == ACCOUNT => {
                    accounts.push(parse_account(&element, accounts.len())?);
                    remaining.push(Node::Element(element));
                }
                Node::Element(element) if element.name == TRANSACTION => {
                    transaction_slot.get_or_insert(remaining.len());
                    transactions.push(parse_transaction(element, transactions.len())?);
                }
                node => remaining.push(node),
            }
        }
        let transaction_slot = transaction_slot.unwrap_or_else(|| {
            remaining
                .iter()
                .rposition(|node| matches!(node, Node::Element(e) if e.name == ACCOUNT))
                .map(|index| index + 1)
                .unwrap_or(remaining.len())
        });
        book.children = remaining;

        Ok(Self {
            accounts,
            transactions,
            document,
            book_path,
            transaction_slot,
        })
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.iter().find(|account| &account.id == id)
    }

    pub fn to_document(&self) -> Document {
        let mut document = self.document.clone();
        let book = element_at_mut(&mut document.root, &self.book_path);
        update_transaction_count(book, self.transactions.len());
        let transactions = self
            .transactions
            .iter()
            .map(|transaction| Node::Element(transaction_element(transaction)));
        book.children
            .splice(self.transaction_slot..self.transaction_slot, transactions);
        document
    }
}

fn find_book(root: &Element) -> Option<Vec<usize>> {
    if root.name == BOOK {
        return Some(Vec::new());
    }
    root.children
        .iter()
        .enumerate()
        .find_map(|(index, node)| match node {
            Node::Element(element) => find_book(element).map(|mut path| {
                path.insert(0, index);
                path
            }),
            _ => None,
        })
}

fn element_at_mut<'a>(root: &'a mut Element, path: &[usize]) -> &'a mut Element {
    path.iter().fold(root, |element, &index| {
        match &mut element.children[index] {
            Node::Element(child) => child,
            // paths only ever come from find_book
            _ => unreachable!("book path points at a non-element node"),
        }
    })
}

fn update_transaction_count(book: &mut Element, count: usize) {
    for node in &mut book.children {
        if let Node::Element(element) = node {
            if element.name == COUNT_DATA && element.attribute("cd:type") == Some("transaction") {
                element.children = vec![Node::Text(count.to_string())];
            }
        }
    }
}

fn missing(element: &str, location: impl Into<String>) -> Error {
    Error::SchemaValidation {
        element: element.to_string(),
        location: location.into(),
    }
}

fn required_text(parent: &Element, name: &str, location: &str) -> Result<String> {
    parent
        .child_text(name)
        .ok_or_else(|| missing(name, location))
}

fn parse_account(element: &Element, index: usize) -> Result<Account> {
    let location = format!("{ACCOUNT} #{index}");
    Ok(Account {
        id: AccountId(required_text(element, "act:id", &location)?),
        name: required_text(element, "act:name", &location)?,
        kind: required_text(element, "act:type", &location)?,
        commodity: element
            .child("act:commodity")
            .and_then(|commodity| commodity.child_text("cmdty:id")),
        parent: element.child_text("act:parent").map(AccountId),
    })
}

fn parse_timestamp(parent: &Element, name: &str, location: &str) -> Result<DateTime<FixedOffset>> {
    let text = parent
        .child(name)
        .and_then(|date| date.child_text("ts:date"))
        .ok_or_else(|| missing(name, location))?;
    DateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).map_err(|_| Error::MalformedDate {
        text,
        format: TIMESTAMP_FORMAT,
    })
}

fn parse_transaction(element: Element, index: usize) -> Result<Transaction> {
    let location = format!("{TRANSACTION} #{index}");
    let splits = element
        .child("trn:splits")
        .ok_or_else(|| missing("trn:splits", location.as_str()))?
        .elements()
        .filter(|split| split.name == "trn:split")
        .enumerate()
        .map(|(split_index, split)| parse_split(split, &format!("{location}, split #{split_index}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(Transaction {
        id: TransactionId(required_text(&element, "trn:id", &location)?),
        currency: element
            .child("trn:currency")
            .and_then(|currency| currency.child_text("cmdty:id"))
            .ok_or_else(|| missing("trn:currency", location.as_str()))?,
        date_posted: parse_timestamp(&element, "trn:date-posted", &location)?,
        date_entered: parse_timestamp(&element, "trn:date-entered", &location)?,
        description: element.child_text("trn:description").unwrap_or_default(),
        splits,
        source: Some(element),
    })
}

fn parse_split(element: &Element, location: &str) -> Result<Split> {
    let reconciled = element.child_text("split:reconciled-state").unwrap_or_default();
    Ok(Split {
        id: SplitId(required_text(element, "split:id", location)?),
        memo: element.child_text("split:memo").unwrap_or_default(),
        reconciled: ReconcileState::parse(reconciled.trim())
            .ok_or_else(|| missing("split:reconciled-state", location))?,
        value: required_text(element, "split:value", location)?.parse()?,
        quantity: required_text(element, "split:quantity", location)?.parse()?,
        account: AccountId(required_text(element, "split:account", location)?),
    })
}

fn guid(name: &str, value: &str) -> Element {
    Element::new(name)
        .with_attribute("type", "guid")
        .with_text(value)
}

fn timestamp(name: &str, value: &DateTime<FixedOffset>) -> Element {
    Element::new(name)
        .with_child(Element::new("ts:date").with_text(value.format(TIMESTAMP_FORMAT).to_string()))
}

fn transaction_element(transaction: &Transaction) -> Element {
    if let Some(source) = &transaction.source {
        return source.clone();
    }
    let splits = transaction
        .splits
        .iter()
        .fold(Element::new("trn:splits"), |splits, split| {
            splits.with_child(
                Element::new("trn:split")
                    .with_child(guid("split:id", &split.id.0))
                    .with_child(Element::new("split:memo").with_text(split.memo.as_str()))
                    .with_child(
                        Element::new("split:reconciled-state")
                            .with_text(split.reconciled.as_str()),
                    )
                    .with_child(Element::new("split:value").with_text(split.value.to_string()))
                    .with_child(
                        Element::new("split:quantity").with_text(split.quantity.to_string()),
                    )
                    .with_child(guid("split:account", &split.account.0)),
            )
        });
    Element::new(TRANSACTION)
        .with_attribute("version", "2.0.0")
        .with_child(guid("trn:id", &transaction.id.0))
        .with_child(
            Element::new("trn:currency")
                .with_child(Element::new("cmdty:space").with_text("ISO4217"))
                .with_child(Element::new("cmdty:id").with_text(transaction.currency.as_str())),
        )
        .with_child(timestamp("trn:date-posted", &transaction.date_posted))
        .with_child(timestamp("trn:date-entered", &transaction.date_entered))
        .with_child(Element::new("trn:description").with_text(transaction.description.as_str()))
        .with_child(splits)
}
