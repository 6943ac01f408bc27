use std::collections::{hash_map::Entry, HashMap};

use crate::error::{Error, Result};
use crate::ledger::{Account, AccountId};

/// Decides whether an account is the one a rule means by `name` (and `kind`).
pub trait MatchStrategy {
    fn matches(&self, account: &Account, name: &str, kind: Option<&str>) -> bool;
}

/// Partial match: the account name contains `name`, its type contains `kind`.
///
/// Account names differ slightly between books, so this is the default. It is
/// ambiguous, the first account in document order wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatch;

impl MatchStrategy for SubstringMatch {
    fn matches(&self, account: &Account, name: &str, kind: Option<&str>) -> bool {
        account.name.contains(name) && kind.map_or(true, |kind| account.kind.contains(kind))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl MatchStrategy for ExactMatch {
    fn matches(&self, account: &Account, name: &str, kind: Option<&str>) -> bool {
        account.name == name && kind.map_or(true, |kind| account.kind == kind)
    }
}

/// Looks up account ids by name, remembering every answer for the rest of the run.
pub struct AccountResolver<'a, M: MatchStrategy = SubstringMatch> {
    accounts: &'a [Account],
    strategy: M,
    cache: HashMap<(Option<String>, String), AccountId>,
}

impl<'a> AccountResolver<'a, SubstringMatch> {
    pub fn new(accounts: &'a [Account]) -> Self {
        Self::with_strategy(accounts, SubstringMatch)
    }
}

impl<'a, M: MatchStrategy> AccountResolver<'a, M> {
    pub fn with_strategy(accounts: &'a [Account], strategy: M) -> Self {
        Self {
            accounts,
            strategy,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, name: &str, kind: Option<&str>) -> Result<AccountId> {
        match self
            .cache
            .entry((kind.map(str::to_string), name.to_string()))
        {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let account = self
                    .accounts
                    .iter()
                    .find(|account| self.strategy.matches(account, name, kind))
                    .ok_or_else(|| Error::AccountNotFound {
                        name: name.to_string(),
                        kind: kind.map(str::to_string),
                    })?;
                log::debug!("Resolved account {name:?} to {:?}", account.name);
                Ok(entry.insert(account.id.clone()).clone())
            }
        }
    }
}
