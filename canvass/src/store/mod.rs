//! Response state
//!
//! Committed state is what the host has durably stored. Pending state holds
//! the edits made on the question currently shown; it is merged into
//! committed state when a transition commits and discarded by a rollback.
//! Lookups always see pending edits over committed values.

pub mod entry;
pub mod fields;
pub mod legacy_index;
pub mod persistence;

use crate::ast::is_identifier;
use crate::evaluator::{Value, ValueSource};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::debug;

pub use entry::{ResponseEntry, ResponseValue};
pub use legacy_index::LegacyIndex;
pub use persistence::{ChangeSet, MemoryPersistence, Persistence, StoreReceipt};

/// Committed and pending halves captured before a transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    committed: HashMap<String, ResponseEntry>,
    pending: HashMap<String, Option<ResponseEntry>>,
}

#[derive(Debug, Default)]
pub struct ResponseStore {
    committed: HashMap<String, ResponseEntry>,
    /// `None` marks a question whose answer was removed
    pending: HashMap<String, Option<ResponseEntry>>,
    field_counts: HashMap<String, usize>,
    resolved: RefCell<HashMap<String, ResponseValue>>,
    prior: HashMap<String, ResponseValue>,
    legacy: LegacyIndex,
    row_owners: HashMap<String, String>,
}

/// `field.question`, or just the question when no field is named
pub fn compound_key(field: &str, question: &str) -> String {
    if field.is_empty() || field == question {
        question.to_string()
    } else {
        format!("{}.{}", field, question)
    }
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid row id to owning grid id, used to resolve bare row references
    pub fn with_row_owners(mut self, row_owners: HashMap<String, String>) -> Self {
        self.row_owners = row_owners;
        self
    }

    /// Answers carried over from an earlier survey
    pub fn set_prior_results(&mut self, prior: HashMap<String, ResponseValue>) {
        self.prior = prior;
        self.invalidate();
    }

    pub fn load_committed(&mut self, committed: HashMap<String, ResponseEntry>) {
        self.committed = committed;
        self.pending.clear();
        self.invalidate();
    }

    pub fn set_legacy_index(&mut self, legacy: LegacyIndex) {
        self.legacy = legacy;
        self.invalidate();
    }

    fn invalidate(&self) {
        self.resolved.borrow_mut().clear();
    }

    /// Answerable-field count of a question, counted from its markup once
    pub fn field_count(&mut self, question: &str, markup: &str) -> usize {
        *self
            .field_counts
            .entry(question.to_string())
            .or_insert_with(|| fields::count_fields(markup))
    }

    pub fn cached_field_count(&self, question: &str) -> Option<usize> {
        self.field_counts.get(question).copied()
    }

    /// Current entry for a question, pending edits first
    pub fn entry(&self, question: &str) -> Option<&ResponseEntry> {
        match self.pending.get(question) {
            Some(pending) => pending.as_ref(),
            None => self.committed.get(question),
        }
    }

    pub fn committed_entry(&self, question: &str) -> Option<&ResponseEntry> {
        self.committed.get(question)
    }

    /// Store `value` for `field` of `question`.
    ///
    /// With one field the value is stored bare; with more it goes under the
    /// field key. An empty value clears the field.
    pub fn set_response(
        &mut self,
        question: &str,
        field: &str,
        field_count: usize,
        value: ResponseValue,
    ) {
        if value.is_empty() {
            self.remove_response_item(question, field);
            return;
        }

        let updated = if field_count <= 1 {
            ResponseEntry::Single(value)
        } else {
            let mut map = match self.entry(question) {
                Some(ResponseEntry::Keyed(map)) => map.clone(),
                _ => BTreeMap::new(),
            };
            map.insert(field.to_string(), value);
            ResponseEntry::Keyed(map)
        };
        debug!(question, field, "response set");
        self.pending.insert(question.to_string(), Some(updated));
        self.invalidate();
    }

    /// Clear one field; the entry goes away with its last field
    pub fn remove_response_item(&mut self, question: &str, field: &str) {
        let updated = match self.entry(question) {
            None => return,
            Some(ResponseEntry::Single(_)) => None,
            Some(ResponseEntry::Keyed(map)) => {
                let mut map = map.clone();
                if map.remove(field).is_none() {
                    return;
                }
                (!map.is_empty()).then_some(ResponseEntry::Keyed(map))
            }
        };
        self.pending.insert(question.to_string(), updated);
        self.invalidate();
    }

    pub fn remove_response(&mut self, question: &str) {
        if self.entry(question).is_some() {
            self.pending.insert(question.to_string(), None);
            self.invalidate();
        }
    }

    pub fn find_response_value(&self, field: &str, question: &str) -> Option<ResponseValue> {
        self.lookup(&compound_key(field, question))
    }

    /// Resolve a token: numeric literal, cache, live answers, prior results,
    /// then the legacy index. Found values are cached.
    pub fn lookup(&self, token: &str) -> Option<ResponseValue> {
        if !is_identifier(token) && Decimal::from_str(token.trim()).is_ok() {
            return Some(ResponseValue::scalar(token.trim()));
        }
        if let Some(cached) = self.resolved.borrow().get(token) {
            return Some(cached.clone());
        }

        let found = self
            .resolve_live(token)
            .or_else(|| self.prior.get(token).cloned())
            .or_else(|| self.legacy.find(token))?;
        self.resolved
            .borrow_mut()
            .insert(token.to_string(), found.clone());
        Some(found)
    }

    /// Answer held for `field` in pending or committed state, without the
    /// prior-result and legacy fallbacks
    pub fn live_value(&self, field: &str, question: &str) -> Option<ResponseValue> {
        self.resolve_live(&compound_key(field, question))
    }

    fn resolve_live(&self, token: &str) -> Option<ResponseValue> {
        if let Some((field, question)) = token.split_once('.') {
            if let Some(entry) = self.entry(question) {
                return entry.field(field).cloned();
            }
            return self
                .row_owners
                .get(question)
                .and_then(|grid| self.entry(grid))
                .and_then(|entry| entry.field(&format!("{}_{}", question, field)))
                .cloned();
        }
        if let Some(entry) = self.entry(token) {
            return entry.primary().cloned();
        }
        self.row_owners
            .get(token)
            .and_then(|grid| self.entry(grid))
            .and_then(|entry| match entry {
                ResponseEntry::Keyed(map) => map.get(token),
                // a one-row grid stores its only row bare
                ResponseEntry::Single(value) => Some(value),
            })
            .cloned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = (&str, Option<&ResponseEntry>)> {
        self.pending.iter().map(|(q, e)| (q.as_str(), e.as_ref()))
    }

    pub fn committed(&self) -> &HashMap<String, ResponseEntry> {
        &self.committed
    }

    /// Fold pending edits into committed state
    pub fn merge_pending(&mut self) {
        for (question, entry) in self.pending.drain() {
            match entry {
                Some(entry) => {
                    self.committed.insert(question, entry);
                }
                None => {
                    self.committed.remove(&question);
                }
            }
        }
        self.invalidate();
    }

    pub fn discard_pending(&mut self) {
        self.pending.clear();
        self.invalidate();
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            committed: self.committed.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.committed = snapshot.committed;
        self.pending = snapshot.pending;
        self.invalidate();
    }
}

impl ValueSource for ResponseStore {
    fn resolve(&self, token: &str) -> Option<Value> {
        self.lookup(token).map(Value::from)
    }
}
