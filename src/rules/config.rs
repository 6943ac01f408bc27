use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::import::AmountField;

/// One YAML rule file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub default: DefaultAccounts,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Accounts unmatched records are booked between.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultAccounts {
    pub account: Option<String>,
    pub imbalance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    pub key: String,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Book(BookRule),
    Exchange(ExchangeRule),
    Ignore,
    MergeWithNext,
    StoreForwardReference,
}

/// Two-leg posting: `account1` receives the amount, `account2` gives it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookRule {
    pub account1: String,
    #[serde(default)]
    pub kind1: Option<String>,
    pub account2: String,
    #[serde(default)]
    pub kind2: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memo1: Option<String>,
    #[serde(default)]
    pub memo2: Option<String>,
    #[serde(default)]
    pub amount: AmountField,
    #[serde(default)]
    pub cleared: bool,
}

/// Four-leg posting between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeRule {
    pub account1: String,
    #[serde(default)]
    pub kind1: Option<String>,
    pub trading1: String,
    pub account2: String,
    #[serde(default)]
    pub kind2: Option<String>,
    pub trading2: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memo1: Option<String>,
    #[serde(default)]
    pub memo2: Option<String>,
    #[serde(default)]
    pub amount: AmountField,
}

impl RuleFile {
    pub fn parse(content: &str) -> Result<Self> {
        let file: RuleFile = serde_yaml::from_str(content)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for rule in &self.rules {
            let invalid = |reason| Error::InvalidRule {
                key: rule.key.clone(),
                reason,
            };
            if rule.key.is_empty() {
                return Err(invalid("key must not be empty"));
            }
            if !keys.insert(rule.key.as_str()) {
                return Err(invalid("key is defined twice in the same file"));
            }
            let accounts = match &rule.action {
                Action::Book(book) => vec![&book.account1, &book.account2],
                Action::Exchange(exchange) => vec![
                    &exchange.account1,
                    &exchange.trading1,
                    &exchange.account2,
                    &exchange.trading2,
                ],
                Action::Ignore | Action::MergeWithNext | Action::StoreForwardReference => vec![],
            };
            if accounts.iter().any(|account| account.is_empty()) {
                return Err(invalid("account names must not be empty"));
            }
        }
        Ok(())
    }
}

/// All rule files of a run, merged in the order they were given.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub default: DefaultAccounts,
    pub rules: HashMap<String, Action>,
}

impl RuleSet {
    pub fn merge(&mut self, file: RuleFile) {
        if file.default.account.is_some() {
            self.default.account = file.default.account;
        }
        if file.default.imbalance.is_some() {
            self.default.imbalance = file.default.imbalance;
        }
        for rule in file.rules {
            if self.rules.insert(rule.key.clone(), rule.action).is_some() {
                log::warn!("Rule {:?} is defined more than once, using the last one", rule.key);
            }
        }
    }

    pub fn load(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut set = Self::default();
        for path in paths {
            let path = path.as_ref();
            log::info!("Loading rules from {}...", path.display());
            let file = RuleFile::parse(&std::fs::read_to_string(path)?)?;
            log::info!("Loading rules from {}...done ({} rules)", path.display(), file.rules.len());
            set.merge(file);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const RULES: &str = r#"
default:
  imbalance: Imbalance-EUR
rules:
  - key: DonationsCreditCardVISA
    action: book
    account1: Concardis
    kind1: BANK
    account2: Donations
    description: "Donation from {name}"
    amount: gross
    cleared: true
  - key: Currency ConversionCompleted
    action: store_forward_reference
  - key: Payment SentCompleted
    action: exchange
    account1: PayPal
    trading1: Trading EUR
    account2: Donations USD
    trading2: Trading USD
  - key: Refund
    action: ignore
  - key: Split
    action: merge_with_next
"#;

    #[test]
    fn parse_all_actions() {
        let file = RuleFile::parse(RULES).unwrap();
        assert_eq!(None, file.default.account);
        assert_eq!(Some("Imbalance-EUR".to_string()), file.default.imbalance);
        assert_eq!(5, file.rules.len());
        assert_eq!(
            Action::Book(BookRule {
                account1: "Concardis".to_string(),
                kind1: Some("BANK".to_string()),
                account2: "Donations".to_string(),
                kind2: None,
                description: Some("Donation from {name}".to_string()),
                memo1: None,
                memo2: None,
                amount: AmountField::Gross,
                cleared: true,
            }),
            file.rules[0].action
        );
        assert_eq!(Action::StoreForwardReference, file.rules[1].action);
        assert!(matches!(
            &file.rules[2].action,
            Action::Exchange(ExchangeRule { trading2, amount: AmountField::Net, .. }) if trading2 == "Trading USD"
        ));
        assert_eq!(Action::Ignore, file.rules[3].action);
        assert_eq!(Action::MergeWithNext, file.rules[4].action);
    }

    #[test]
    fn empty_file() {
        let file = RuleFile::parse("{}").unwrap();
        assert!(file.rules.is_empty());
    }

    #[test]
    fn unknown_action() {
        let result = RuleFile::parse("rules:\n  - key: a\n    action: explode\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn book_without_accounts() {
        let result = RuleFile::parse("rules:\n  - key: a\n    action: book\n    account1: X\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn duplicate_key() {
        let result = RuleFile::parse(
            "rules:\n  - key: a\n    action: ignore\n  - key: a\n    action: merge_with_next\n",
        );
        assert!(matches!(result, Err(Error::InvalidRule { key, .. }) if key == "a"));
    }

    #[test]
    fn empty_account_name() {
        let result = RuleFile::parse(
            "rules:\n  - key: a\n    action: book\n    account1: ''\n    account2: X\n",
        );
        assert!(matches!(result, Err(Error::InvalidRule { .. })));
    }

    #[test]
    fn later_files_override() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.yaml");
        let second = dir.path().join("second.yaml");
        std::fs::File::create(&first)
            .unwrap()
            .write_all(b"default:\n  account: Bank\n  imbalance: Imbalance\nrules:\n  - key: a\n    action: ignore\n  - key: b\n    action: ignore\n")
            .unwrap();
        std::fs::File::create(&second)
            .unwrap()
            .write_all(b"default:\n  account: Concardis\nrules:\n  - key: a\n    action: merge_with_next\n")
            .unwrap();

        let set = RuleSet::load(&[first, second]).unwrap();
        assert_eq!(
            DefaultAccounts {
                account: Some("Concardis".to_string()),
                imbalance: Some("Imbalance".to_string()),
            },
            set.default
        );
        assert_eq!(Some(&Action::MergeWithNext), set.rules.get("a"));
        assert_eq!(Some(&Action::Ignore), set.rules.get("b"));
    }
}
