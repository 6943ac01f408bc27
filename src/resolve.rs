//! Groups records that belong together before they are booked.
//!
//! Providers split one business event over several CSV lines: a payment and
//! its currency conversion, a refund and the original sale. Lines refer to
//! each other by transaction id, in either direction.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::import::TransactionRecord;
use crate::rules::{Handler, RuleOutcome, RuleRegistry};

/// A record ready to be booked, with everything that was merged into it.
pub struct Booking<'r> {
    pub primary: TransactionRecord,
    pub related: Vec<TransactionRecord>,
    pub handler: &'r dyn Handler,
}

impl std::fmt::Debug for Booking<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Booking")
            .field("primary", &self.primary.id)
            .field(
                "related",
                &self.related.iter().map(|record| &record.id).collect::<Vec<_>>(),
            )
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Single pass over the records of one run, in file order.
pub struct ReferenceResolver<'r> {
    registry: &'r RuleRegistry,
    pending_merge: Option<TransactionRecord>,
    /// Open groups, keyed by the id of the record they eventually belong to.
    forward_refs: HashMap<String, Vec<TransactionRecord>>,
    /// Group key of every record stored in `forward_refs`.
    filed_under: HashMap<String, String>,
}

impl<'r> ReferenceResolver<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            pending_merge: None,
            forward_refs: HashMap::new(),
            filed_under: HashMap::new(),
        }
    }

    /// Feed the next record. Returns what is ready to be booked, if anything.
    pub fn push(&mut self, record: TransactionRecord) -> Result<Option<Booking<'r>>> {
        match self.registry.classify(&record) {
            RuleOutcome::MergeWithNext => {
                if self.pending_merge.is_some() {
                    return Err(Error::ConflictingMerge {
                        id: record.id,
                        reason: "another record is already waiting to be merged",
                    });
                }
                log::debug!("Line {}: {} is merged into the next record", record.line, record.id);
                self.pending_merge = Some(record);
                Ok(None)
            }
            RuleOutcome::StoreForwardReference => {
                self.store(record);
                Ok(None)
            }
            RuleOutcome::Ignore => {
                log::debug!("Line {}: ignoring {}", record.line, record.id);
                Ok(None)
            }
            RuleOutcome::Invoke(handler) => {
                let group = self.take_group(&record.id);
                let related = match (self.pending_merge.take(), group) {
                    (Some(_), Some(_)) => {
                        return Err(Error::ConflictingMerge {
                            id: record.id,
                            reason: "record is both merged with the previous one and referenced by others",
                        })
                    }
                    (Some(previous), None) => vec![previous],
                    (None, Some(group)) => group,
                    (None, None) => vec![],
                };
                Ok(Some(Booking {
                    primary: record,
                    related,
                    handler,
                }))
            }
        }
    }

    /// Everything still waiting at the end of the input, booked with the default handler.
    pub fn finish(mut self) -> Vec<Booking<'r>> {
        let handler = self.registry.default_handler();
        let mut groups: Vec<(String, Vec<TransactionRecord>)> = self.forward_refs.drain().collect();
        groups.sort_by_key(|(_, records)| records.iter().map(|record| record.line).min());

        let mut bookings = Vec::new();
        if let Some(record) = self.pending_merge.take() {
            log::warn!("Line {}: {} was never merged, booking it on its own", record.line, record.id);
            bookings.push(Booking {
                primary: record,
                related: vec![],
                handler,
            });
        }
        for (key, mut records) in groups {
            let primary = records
                .iter()
                .position(|record| record.id == key)
                .unwrap_or(0);
            let primary = records.remove(primary);
            log::warn!(
                "Transaction {key} was referenced by {} records but never booked",
                records.len()
            );
            bookings.push(Booking {
                primary,
                related: records,
                handler,
            });
        }
        bookings.sort_by_key(|booking| booking.primary.line);
        bookings
    }

    fn store(&mut self, record: TransactionRecord) {
        // Follow the reference to the root of its chain.
        let target = record.reference.clone().unwrap_or_else(|| record.id.clone());
        let key = self.filed_under.get(&target).cloned().unwrap_or(target);

        let mut group = self.forward_refs.remove(&key).unwrap_or_default();
        if record.id != key {
            if let Some(referencing) = self.forward_refs.remove(&record.id) {
                log::debug!("Re-filing the records referencing {} under {key}", record.id);
                for stored in &referencing {
                    self.filed_under.insert(stored.id.clone(), key.clone());
                }
                group.extend(referencing);
            }
        }
        if let Some(previous) = self.pending_merge.take() {
            self.filed_under.insert(previous.id.clone(), key.clone());
            group.push(previous);
        }
        log::debug!("Line {}: {} waits for {key}", record.line, record.id);
        self.filed_under.insert(record.id.clone(), key.clone());
        group.push(record);
        group.sort_by_key(|record| record.line);
        self.forward_refs.insert(key, group);
    }

    fn take_group(&mut self, id: &str) -> Option<Vec<TransactionRecord>> {
        let group = self.forward_refs.remove(id)?;
        for record in &group {
            self.filed_under.remove(&record.id);
        }
        Some(group)
    }
}
