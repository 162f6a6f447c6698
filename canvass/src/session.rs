//! Survey session
//!
//! One `SurveySession` per respondent ties the compiled sequence, response
//! store, navigator and persistence together. Every transition is optimistic:
//! pending edits are merged and the navigator moves, then the change set is
//! stored. A failed store restores both halves of the response state and the
//! navigator from the snapshot captured before the transition.

use crate::compiler::record::CHECKBOX_KEY;
use crate::compiler::worker::compile_on_worker;
use crate::compiler::{compile, QuestionRecord, QuestionSequence, SurveyContext};
use crate::config::SessionConfig;
use crate::error::SurveyError;
use crate::evaluator::{Evaluator, Value};
use crate::navigation::mandatory::{self, GateOutcome};
use crate::navigation::{NavigationEnv, NavigationHistory, NavigationState, Navigator};
use crate::store::persistence::{COMPLETED_AT_KEY, COMPLETED_KEY, HISTORY_FRAMES_KEY, HISTORY_KEY};
use crate::store::{
    ChangeSet, LegacyIndex, Persistence, ResponseEntry, ResponseStore, ResponseValue,
    StoreReceipt, StoreSnapshot,
};
use crate::SurveyResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SAVE_FAILED_MESSAGE: &str = "Your answers could not be saved. Please try again.";

/// Recoverable-error notification that dismisses itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
    pub dismiss_after: Duration,
}

/// Outcome of a navigation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// `restored` carries stored answers to re-apply after a retreat
    Moved {
        to: String,
        restored: Option<ResponseEntry>,
    },
    /// The end question is active; submit instead of advancing
    Terminal { at: String },
    Submitted {
        at: String,
        completed_at: DateTime<Utc>,
    },
    /// Mandatory question left unanswered
    Blocked { unanswered: usize, overridable: bool },
    Unchanged,
    /// Storing failed; `active` is the question shown before the request
    RolledBack {
        active: String,
        restored: Option<ResponseEntry>,
        notice: Notice,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
}

#[derive(Debug, Clone)]
struct CommitSnapshot {
    store: StoreSnapshot,
    navigator: Navigator,
}

/// A transition applied in memory whose change set still has to be stored
#[derive(Debug, Clone)]
pub struct PendingCommit {
    pub changes: ChangeSet,
    pub transition: Transition,
    snapshot: CommitSnapshot,
}

/// Result of starting a transition without storing it
#[derive(Debug, Clone)]
pub enum Deferred {
    /// Store `changes`, then hand the result to `settle`
    Ready(PendingCommit),
    /// Nothing to store
    Settled(Transition),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedValue {
    pub element_id: String,
    pub expression: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NumericBounds {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

pub struct SurveySession {
    config: SessionConfig,
    survey_name: String,
    context: SurveyContext,
    sequence: Arc<QuestionSequence>,
    evaluator: Evaluator,
    store: ResponseStore,
    navigator: Navigator,
    persistence: Box<dyn Persistence>,
}

impl SurveySession {
    /// Compile `definition` and open a session on it
    pub fn compile(
        definition: &str,
        source_id: &str,
        config: SessionConfig,
        persistence: impl Persistence + 'static,
    ) -> SurveyResult<Self> {
        let sequence = match config.worker_timeout() {
            Some(timeout) => compile_on_worker(definition, source_id, &config.limits, timeout)?,
            None => compile(definition, source_id, &config.limits)?,
        };
        Ok(Self::from_sequence(Arc::new(sequence), config, persistence))
    }

    /// Open a session on an already compiled sequence
    pub fn from_sequence(
        sequence: Arc<QuestionSequence>,
        config: SessionConfig,
        persistence: impl Persistence + 'static,
    ) -> Self {
        let survey_name = if config.survey_name.is_empty() {
            sequence.name().to_string()
        } else {
            config.survey_name.clone()
        };
        let context = config
            .context
            .iter()
            .fold(SurveyContext::capture(config.user.as_deref()), |ctx, (k, v)| {
                ctx.with(k.clone(), v.clone())
            });
        Self {
            survey_name,
            context,
            evaluator: Evaluator::new(&config.limits),
            store: ResponseStore::new().with_row_owners(sequence.row_owners()),
            navigator: Navigator::new(&sequence, &config.limits),
            sequence,
            persistence: Box::new(persistence),
            config,
        }
    }

    /// Replace the captured context, e.g. to pin the date
    pub fn with_context(mut self, context: SurveyContext) -> Self {
        self.context = context;
        self
    }

    pub fn set_prior_results(&mut self, prior: HashMap<String, ResponseValue>) {
        self.store.set_prior_results(prior);
    }

    pub fn survey_name(&self) -> &str {
        &self.survey_name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn context(&self) -> &SurveyContext {
        &self.context
    }

    pub fn sequence(&self) -> &QuestionSequence {
        &self.sequence
    }

    pub fn store(&self) -> &ResponseStore {
        &self.store
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn state(&self) -> &NavigationState {
        self.navigator.state()
    }

    pub fn current(&self) -> Option<&QuestionRecord> {
        self.navigator
            .current()
            .and_then(|id| self.sequence.get(id))
    }

    pub fn markup(&self, question: &str) -> Option<&str> {
        self.sequence
            .get(question)
            .map(|record| record.markup(&self.context))
    }

    pub fn history(&self) -> &NavigationHistory {
        self.navigator.history()
    }

    pub fn history_json(&self) -> serde_json::Value {
        self.navigator.history().to_json()
    }

    pub fn start(&mut self) -> SurveyResult<String> {
        let env = NavigationEnv {
            sequence: &self.sequence,
            evaluator: &self.evaluator,
            source: &self.store,
        };
        let first = self.navigator.start(env)?;
        info!(survey = %self.survey_name, question = %first, "session started");
        Ok(first)
    }

    /// Continue from what persistence has stored, or start fresh
    pub fn resume(&mut self) -> SurveyResult<String> {
        let Some(state) = self.persistence.retrieve()? else {
            return self.start();
        };

        let prefix = format!("{}.", self.survey_name);
        let mut committed = HashMap::new();
        let mut history = None;
        let mut frames = None;
        if let Some(map) = state.as_object() {
            for (key, value) in map {
                let Some(question) = key.strip_prefix(&prefix) else {
                    continue;
                };
                match question {
                    HISTORY_KEY => history = Some(value),
                    HISTORY_FRAMES_KEY => frames = Some(value),
                    COMPLETED_KEY | COMPLETED_AT_KEY => {}
                    _ => match serde_json::from_value::<ResponseEntry>(value.clone()) {
                        Ok(entry) => {
                            committed.insert(question.to_string(), entry);
                        }
                        Err(_) => debug!(key = %key, "stored value left to the legacy index"),
                    },
                }
            }
        }

        let history = history
            .map(|ids| NavigationHistory::restore(ids, frames))
            .transpose()?;
        debug!(answers = committed.len(), "resuming stored state");
        self.store.load_committed(committed);
        self.store.set_legacy_index(LegacyIndex::build(state));
        match history {
            Some(history) if !history.is_empty() => {
                let current = self.navigator.resume(history, &self.sequence)?;
                info!(survey = %self.survey_name, question = %current, "session resumed");
                Ok(current)
            }
            _ => self.start(),
        }
    }

    fn active(&self) -> SurveyResult<(Arc<QuestionSequence>, String)> {
        let id = self
            .navigator
            .current()
            .ok_or_else(|| SurveyError::Navigation("the survey has not started".to_string()))?;
        Ok((Arc::clone(&self.sequence), id.to_string()))
    }

    /// Record an answer for a field of the active question.
    ///
    /// Selecting an exclusive checkbox clears the rest of its group, and a
    /// field in an `xor=` group clears the other fields of that group.
    pub fn set_field(&mut self, field: &str, value: ResponseValue) -> SurveyResult<()> {
        let (sequence, question) = self.active()?;
        let record = sequence
            .get(&question)
            .ok_or_else(|| SurveyError::Navigation(format!("unknown question '{}'", question)))?;
        let fields = record.fields();
        let spec = fields.iter().find(|f| f.key == field).ok_or_else(|| {
            SurveyError::State(format!("question '{}' has no field '{}'", question, field))
        })?;

        let count = self
            .store
            .field_count(&question, record.markup(&self.context));
        let value = if field == CHECKBOX_KEY {
            self.apply_sole_options(record, value)
        } else {
            value
        };

        if let Some(group) = spec.xor_group.as_ref().filter(|_| !value.is_empty()) {
            for other in fields
                .iter()
                .filter(|f| f.key != field && f.xor_group.as_ref() == Some(group))
            {
                self.store.remove_response_item(&question, &other.key);
            }
        }

        self.store.set_response(&question, field, count, value);
        self.navigator.refresh_bounds_for(&question, &self.store);
        Ok(())
    }

    fn apply_sole_options(&self, record: &QuestionRecord, value: ResponseValue) -> ResponseValue {
        let sole = record.sole_values();
        let ResponseValue::List(selected) = value else {
            return value;
        };
        if sole.is_empty() || selected.len() < 2 {
            return ResponseValue::List(selected);
        }

        let previous: Vec<String> = self
            .store
            .entry(&record.id)
            .and_then(|entry| entry.field(CHECKBOX_KEY))
            .map(|v| v.values().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        let newly_sole = selected
            .iter()
            .find(|v| sole.contains(&v.as_str()) && !previous.contains(v));
        match newly_sole {
            Some(choice) => ResponseValue::List(vec![choice.clone()]),
            None => ResponseValue::List(
                selected
                    .into_iter()
                    .filter(|v| !sole.contains(&v.as_str()))
                    .collect(),
            ),
        }
    }

    pub fn clear_field(&mut self, field: &str) -> SurveyResult<()> {
        let (_, question) = self.active()?;
        self.store.remove_response_item(&question, field);
        self.navigator.refresh_bounds_for(&question, &self.store);
        Ok(())
    }

    pub fn gate(&self) -> GateOutcome {
        match self.current() {
            Some(record) if matches!(self.state(), NavigationState::Active(_)) => {
                mandatory::check(record, &self.evaluator, &self.store)
            }
            _ => GateOutcome::Open,
        }
    }

    /// Advance unless a mandate blocks it, storing the transition
    pub fn advance(&mut self) -> SurveyResult<Transition> {
        if let GateOutcome::Blocked {
            unanswered,
            overridable,
        } = self.gate()
        {
            debug!(unanswered, overridable, "advance blocked by mandate");
            return Ok(Transition::Blocked {
                unanswered,
                overridable,
            });
        }
        self.commit(Direction::Forward)
    }

    /// Advance past a soft mandate; hard mandates still block
    pub fn advance_anyway(&mut self) -> SurveyResult<Transition> {
        if let GateOutcome::Blocked {
            unanswered,
            overridable: false,
        } = self.gate()
        {
            return Ok(Transition::Blocked {
                unanswered,
                overridable: false,
            });
        }
        self.commit(Direction::Forward)
    }

    pub fn retreat(&mut self) -> SurveyResult<Transition> {
        self.commit(Direction::Back)
    }

    fn commit(&mut self, direction: Direction) -> SurveyResult<Transition> {
        match self.begin(direction)? {
            Deferred::Settled(transition) => Ok(transition),
            Deferred::Ready(commit) => {
                let result = self.persistence.store(&commit.changes);
                Ok(self.settle(commit, result))
            }
        }
    }

    /// Apply an advance in memory and hand back the change set to store
    pub fn advance_deferred(&mut self) -> SurveyResult<Deferred> {
        if let GateOutcome::Blocked {
            unanswered,
            overridable,
        } = self.gate()
        {
            return Ok(Deferred::Settled(Transition::Blocked {
                unanswered,
                overridable,
            }));
        }
        self.begin(Direction::Forward)
    }

    pub fn retreat_deferred(&mut self) -> SurveyResult<Deferred> {
        self.begin(Direction::Back)
    }

    fn begin(&mut self, direction: Direction) -> SurveyResult<Deferred> {
        let snapshot = CommitSnapshot {
            store: self.store.snapshot(),
            navigator: self.navigator.clone(),
        };

        let moved = match direction {
            Direction::Forward => {
                let env = NavigationEnv {
                    sequence: &self.sequence,
                    evaluator: &self.evaluator,
                    source: &self.store,
                };
                self.navigator.next(env)?
            }
            Direction::Back => self.navigator.back(),
        };
        let Some(to) = moved else {
            return Ok(Deferred::Settled(Transition::Unchanged));
        };

        let changes = self.change_set()?;
        self.store.merge_pending();
        let transition = match self.navigator.state() {
            NavigationState::Terminal(_) => Transition::Terminal { at: to },
            _ => {
                let restored = match direction {
                    Direction::Back => self.store.entry(&to).cloned(),
                    Direction::Forward => None,
                };
                Transition::Moved { to, restored }
            }
        };
        Ok(Deferred::Ready(PendingCommit {
            changes,
            transition,
            snapshot,
        }))
    }

    /// Finish a deferred transition with the storage result.
    ///
    /// A failure restores the snapshot taken when the transition began, even
    /// if the session has moved on since.
    pub fn settle(&mut self, commit: PendingCommit, result: SurveyResult<StoreReceipt>) -> Transition {
        match result {
            Ok(receipt) if receipt.is_success() => commit.transition,
            Ok(receipt) => self.rollback(
                commit.snapshot,
                &format!("storage answered with code {}", receipt.code),
            ),
            Err(err) => self.rollback(commit.snapshot, &err.to_string()),
        }
    }

    fn rollback(&mut self, snapshot: CommitSnapshot, reason: &str) -> Transition {
        error!(survey = %self.survey_name, reason, "persisting failed, rolling back");
        self.store.restore(snapshot.store);
        self.navigator = snapshot.navigator;
        let active = self.navigator.current().unwrap_or_default().to_string();
        let restored = self.store.entry(&active).cloned();
        Transition::RolledBack {
            active,
            restored,
            notice: Notice {
                message: SAVE_FAILED_MESSAGE.to_string(),
                dismiss_after: self.config.notice_duration(),
            },
        }
    }

    /// Store everything with the completion flag and timestamp
    pub fn submit(&mut self) -> SurveyResult<Transition> {
        let at = match self.navigator.state() {
            NavigationState::Terminal(id) => id.clone(),
            _ => {
                return Err(SurveyError::Navigation(
                    "the survey can only be submitted from its end question".to_string(),
                ))
            }
        };
        let snapshot = CommitSnapshot {
            store: self.store.snapshot(),
            navigator: self.navigator.clone(),
        };

        let completed_at = Utc::now();
        let mut changes = self.change_set()?;
        changes.insert(&self.survey_name, COMPLETED_KEY, serde_json::Value::Bool(true));
        changes.insert(
            &self.survey_name,
            COMPLETED_AT_KEY,
            serde_json::Value::String(completed_at.to_rfc3339()),
        );
        self.store.merge_pending();

        let result = self.persistence.store(&changes);
        let transition = self.settle(
            PendingCommit {
                changes,
                transition: Transition::Submitted { at, completed_at },
                snapshot,
            },
            result,
        );
        if matches!(transition, Transition::Submitted { .. }) {
            info!(survey = %self.survey_name, "survey submitted");
        }
        Ok(transition)
    }

    fn change_set(&self) -> SurveyResult<ChangeSet> {
        let mut changes = ChangeSet::new();
        for (question, entry) in self.store.pending() {
            let value = match entry {
                Some(entry) => serde_json::to_value(entry)?,
                None => serde_json::Value::Null,
            };
            changes.insert(&self.survey_name, question, value);
        }
        changes.insert(&self.survey_name, HISTORY_KEY, self.history_json());
        changes.insert(
            &self.survey_name,
            HISTORY_FRAMES_KEY,
            self.navigator.history().frames_json(),
        );
        Ok(changes)
    }

    pub fn evaluate(&self, expression: &str) -> SurveyResult<Value> {
        self.evaluator.evaluate(expression, &self.store)
    }

    pub fn find_response_value(&self, field: &str, question: &str) -> Option<ResponseValue> {
        self.store.find_response_value(field, question)
    }

    /// Values of every `{#...}` span of a question, in document order
    pub fn computed_values(&self, question: &str) -> Vec<ComputedValue> {
        let Some(record) = self.sequence.get(question) else {
            return Vec::new();
        };
        record
            .computed_expressions()
            .into_iter()
            .enumerate()
            .map(|(index, expression)| {
                let value = match self.evaluator.evaluate(expression, &self.store) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!(question, expression, error = %err, "computed span failed");
                        None
                    }
                };
                ComputedValue {
                    element_id: format!("{}_computed_{}", question, index + 1),
                    expression: expression.to_string(),
                    value,
                }
            })
            .collect()
    }

    /// Resolved `min=`/`max=` of a numeric field
    pub fn numeric_bounds(&self, question: &str, field: &str) -> NumericBounds {
        let Some(spec) = self
            .sequence
            .get(question)
            .and_then(|record| record.fields().into_iter().find(|f| f.key == field))
        else {
            return NumericBounds::default();
        };
        let resolve = |expression: &Option<String>| {
            expression.as_deref().and_then(|expr| {
                self.evaluator
                    .evaluate(expr, &self.store)
                    .map_err(|err| warn!(question, field, error = %err, "numeric bound failed"))
                    .ok()
                    .and_then(|value| value.as_number())
            })
        };
        NumericBounds {
            min: resolve(&spec.min),
            max: resolve(&spec.max),
        }
    }

    /// Whether a question's display condition currently holds
    pub fn is_visible(&self, question: &str) -> bool {
        self.sequence
            .get(question)
            .and_then(|record| record.directives.display_if.as_deref())
            .is_none_or(|condition| self.evaluator.condition(condition, &self.store))
    }

    pub fn is_field_visible(&self, question: &str, field: &str) -> bool {
        self.sequence
            .get(question)
            .and_then(|record| record.fields().into_iter().find(|f| f.key == field))
            .is_none_or(|spec| {
                !spec.disabled
                    && spec
                        .display_if
                        .as_deref()
                        .is_none_or(|condition| self.evaluator.condition(condition, &self.store))
            })
    }
}
