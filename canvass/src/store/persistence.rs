//! Persistence seam
//!
//! The host supplies the storage. A change set carries only the keys touched
//! by one transition, each qualified by the survey name.

use crate::error::SurveyError;
use crate::SurveyResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const SUCCESS_CODE: u16 = 200;
pub const HISTORY_KEY: &str = "__history";
pub const HISTORY_FRAMES_KEY: &str = "__history_frames";
pub const COMPLETED_KEY: &str = "__completed";
pub const COMPLETED_AT_KEY: &str = "__completed_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    pub code: u16,
}

impl StoreReceipt {
    pub fn ok() -> Self {
        Self { code: SUCCESS_CODE }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Keys written by one transition; `null` marks a removed answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qualified_key(survey: &str, key: &str) -> String {
        format!("{}.{}", survey, key)
    }

    pub fn insert(&mut self, survey: &str, key: &str, value: serde_json::Value) {
        self.entries
            .insert(Self::qualified_key(survey, key), value);
    }

    pub fn get(&self, qualified_key: &str) -> Option<&serde_json::Value> {
        self.entries.get(qualified_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub trait Persistence {
    /// Store the changed keys; only code 200 counts as success
    fn store(&self, changes: &ChangeSet) -> SurveyResult<StoreReceipt>;

    /// Previously committed state, flat and survey-qualified like a change set
    fn retrieve(&self) -> SurveyResult<Option<serde_json::Value>> {
        Ok(None)
    }
}

impl<F> Persistence for F
where
    F: Fn(&ChangeSet) -> SurveyResult<StoreReceipt>,
{
    fn store(&self, changes: &ChangeSet) -> SurveyResult<StoreReceipt> {
        self(changes)
    }
}

#[derive(Debug)]
struct MemoryState {
    saved: BTreeMap<String, serde_json::Value>,
    code: u16,
    failure: Option<String>,
    calls: usize,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            saved: BTreeMap::new(),
            code: SUCCESS_CODE,
            failure: None,
            calls: 0,
        }
    }
}

/// In-memory persistence; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer later calls with `code` without storing anything unless it is 200
    pub fn respond_with(&self, code: u16) {
        self.lock().code = code;
    }

    /// Make later calls fail outright
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    pub fn recover(&self) {
        let mut state = self.lock();
        state.code = SUCCESS_CODE;
        state.failure = None;
    }

    pub fn seed(&self, key: impl Into<String>, value: serde_json::Value) {
        self.lock().saved.insert(key.into(), value);
    }

    pub fn saved(&self) -> BTreeMap<String, serde_json::Value> {
        self.lock().saved.clone()
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }
}

impl Persistence for MemoryPersistence {
    fn store(&self, changes: &ChangeSet) -> SurveyResult<StoreReceipt> {
        let mut state = self.lock();
        state.calls += 1;
        if let Some(message) = &state.failure {
            return Err(SurveyError::Persistence(message.clone()));
        }
        if state.code != SUCCESS_CODE {
            return Ok(StoreReceipt { code: state.code });
        }
        for (key, value) in &changes.entries {
            if value.is_null() {
                state.saved.remove(key);
            } else {
                state.saved.insert(key.clone(), value.clone());
            }
        }
        Ok(StoreReceipt::ok())
    }

    fn retrieve(&self) -> SurveyResult<Option<serde_json::Value>> {
        let state = self.lock();
        if state.saved.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::Value::Object(
            state
                .saved
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )))
    }
}
