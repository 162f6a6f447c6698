//! Navigation state machine
//!
//! `Idle` until started, then `Active(id)` while questions are shown and
//! `Terminal(id)` once the reserved end question is reached. Every transition
//! either completes or leaves history, state and loop bounds untouched.

pub mod history;
pub mod mandatory;

use crate::ast::LoopMarker;
use crate::compiler::record::{CHECKBOX_KEY, RADIO_KEY};
use crate::compiler::{LoopDescriptor, QuestionRecord, QuestionSequence};
use crate::error::SurveyError;
use crate::evaluator::{Evaluator, Value, ValueSource};
use crate::resource_limits::ResourceLimits;
use crate::store::compound_key;
use crate::SurveyResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub use history::NavigationHistory;
pub use mandatory::GateOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum NavigationState {
    #[default]
    Idle,
    Active(String),
    Terminal(String),
}

impl NavigationState {
    pub fn id(&self) -> Option<&str> {
        match self {
            NavigationState::Idle => None,
            NavigationState::Active(id) | NavigationState::Terminal(id) => Some(id),
        }
    }
}

/// What a transition looks at besides the navigator itself
#[derive(Clone, Copy)]
pub struct NavigationEnv<'a> {
    pub sequence: &'a QuestionSequence,
    pub evaluator: &'a Evaluator,
    pub source: &'a dyn ValueSource,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    history: NavigationHistory,
    state: NavigationState,
    loops: Vec<LoopDescriptor>,
    max_steps: usize,
}

impl Navigator {
    pub fn new(sequence: &QuestionSequence, limits: &ResourceLimits) -> Self {
        Self {
            history: NavigationHistory::new(),
            state: NavigationState::Idle,
            loops: sequence.loops().to_vec(),
            max_steps: limits.max_navigation_steps,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn current(&self) -> Option<&str> {
        self.state.id()
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn loops(&self) -> &[LoopDescriptor] {
        &self.loops
    }

    /// Land on the first visible question
    pub fn start(&mut self, env: NavigationEnv<'_>) -> SurveyResult<String> {
        let first = env
            .sequence
            .first()
            .map(|record| record.id.clone())
            .ok_or_else(|| SurveyError::EmptySurvey(env.sequence.name().to_string()))?;
        let saved = self.clone();
        self.history = NavigationHistory::new();
        self.state = NavigationState::Idle;

        match self.walk(None, Some(first), env) {
            Ok(Some(id)) => Ok(id),
            Ok(None) => {
                *self = saved;
                Err(SurveyError::Navigation(
                    "no visible question to start on".to_string(),
                ))
            }
            Err(err) => {
                *self = saved;
                Err(err)
            }
        }
    }

    /// Continue from a stored history
    pub fn resume(&mut self, history: NavigationHistory, sequence: &QuestionSequence) -> SurveyResult<String> {
        let current = history
            .current()
            .map(str::to_string)
            .ok_or_else(|| SurveyError::State("stored history is empty".to_string()))?;
        let record = sequence.get(&current).ok_or_else(|| {
            SurveyError::State(format!("stored history ends on unknown question '{}'", current))
        })?;
        self.state = if record.is_terminal() {
            NavigationState::Terminal(current.clone())
        } else {
            NavigationState::Active(current.clone())
        };
        self.history = history;
        Ok(current)
    }

    /// Advance to the next question.
    ///
    /// `Ok(None)` means there was nowhere to go; nothing changed.
    pub fn next(&mut self, env: NavigationEnv<'_>) -> SurveyResult<Option<String>> {
        let current = match &self.state {
            NavigationState::Active(id) => id.clone(),
            NavigationState::Terminal(id) => {
                warn!(question = %id, "advance requested at the end of the survey");
                return Ok(None);
            }
            NavigationState::Idle => {
                warn!("advance requested before the survey started");
                return Ok(None);
            }
        };
        let record = env.sequence.get(&current).ok_or_else(|| {
            SurveyError::Navigation(format!("active question '{}' is not in the survey", current))
        })?;

        let saved = self.clone();
        self.history.enqueue(selected_skip_targets(record, env));
        match self.walk(Some(current.clone()), None, env) {
            Ok(Some(id)) => {
                debug!(from = %current, to = %id, "advanced");
                Ok(Some(id))
            }
            Ok(None) => {
                warn!(question = %current, "no question follows");
                *self = saved;
                Ok(None)
            }
            Err(err) => {
                *self = saved;
                Err(err)
            }
        }
    }

    /// Step back to the previously shown question
    pub fn back(&mut self) -> Option<String> {
        if matches!(self.state, NavigationState::Idle) {
            warn!("retreat requested before the survey started");
            return None;
        }
        match self.history.back() {
            Some(id) => {
                debug!(to = %id, "retreated");
                self.state = NavigationState::Active(id.clone());
                Some(id)
            }
            None => {
                warn!("retreat requested with no earlier question");
                None
            }
        }
    }

    /// Re-read bounds of every loop driven by `question`.
    ///
    /// Failures are left for the transition that needs the bound.
    pub fn refresh_bounds_for(&mut self, question: &str, source: &dyn ValueSource) {
        for descriptor in self
            .loops
            .iter_mut()
            .filter(|d| d.bound_source_id == question)
        {
            if let Ok(bound) = descriptor.refresh_bound(source) {
                debug!(loop_index = descriptor.loop_index, bound, "loop bound updated");
            }
        }
    }

    /// Walk candidates until one can be shown.
    ///
    /// Candidates come from a forced jump, then the queue, then the record
    /// after `cursor` in compiled order.
    fn walk(
        &mut self,
        mut cursor: Option<String>,
        mut forced: Option<String>,
        env: NavigationEnv<'_>,
    ) -> SurveyResult<Option<String>> {
        for _ in 0..self.max_steps {
            let candidate = match forced.take().or_else(|| self.history.pop_upcoming()) {
                Some(id) => id,
                None => match cursor.as_deref().and_then(|c| env.sequence.successor(c)) {
                    Some(record) => record.id.clone(),
                    None => return Ok(None),
                },
            };
            let Some(position) = env.sequence.position(&candidate) else {
                warn!(target = %candidate, "navigation target does not exist");
                continue;
            };
            let Some(record) = env.sequence.at(position) else {
                continue;
            };

            match record.loop_marker() {
                Some(LoopMarker::Continuation {
                    loop_index,
                    iteration,
                }) => {
                    self.history.visit(candidate.clone());
                    let descriptor = self.descriptor_mut(loop_index)?;
                    let bound = descriptor.refresh_bound(env.source)?;
                    let next_iteration = iteration + 1;
                    if descriptor.admits(next_iteration, bound) {
                        forced = Some(descriptor.iteration_entry(next_iteration));
                        cursor = Some(candidate);
                    } else {
                        debug!(loop_index, iteration, bound, "loop finished");
                        cursor = self.end_marker_id(loop_index, env.sequence);
                    }
                    continue;
                }
                Some(LoopMarker::EndOfLoop { .. }) => {
                    cursor = Some(candidate);
                    continue;
                }
                None => {}
            }

            if let Some(entry) = &record.directives.loop_entry {
                let descriptor = self.descriptor_mut(entry.loop_index)?;
                let bound = descriptor.refresh_bound(env.source)?;
                if !descriptor.admits(entry.iteration, bound) {
                    debug!(question = %candidate, bound, "iteration beyond loop bound");
                    cursor = self.end_marker_id(entry.loop_index, env.sequence);
                    continue;
                }
            }

            if let Some(condition) = &record.directives.display_if {
                if !env.evaluator.condition(condition, env.source) {
                    debug!(question = %candidate, "hidden by display condition");
                    cursor = Some(candidate);
                    continue;
                }
            }

            self.history.visit(candidate.clone());
            self.state = if record.is_terminal() {
                NavigationState::Terminal(candidate.clone())
            } else {
                NavigationState::Active(candidate.clone())
            };
            return Ok(Some(candidate));
        }

        Err(SurveyError::ResourceLimitExceeded {
            limit_name: "max_navigation_steps".to_string(),
            limit_value: self.max_steps.to_string(),
            actual_value: self.max_steps.to_string(),
            suggestion: "Check skip targets and display conditions for a cycle".to_string(),
        })
    }

    fn descriptor_mut(&mut self, loop_index: usize) -> SurveyResult<&mut LoopDescriptor> {
        self.loops
            .iter_mut()
            .find(|d| d.loop_index == loop_index)
            .ok_or_else(|| SurveyError::Navigation(format!("loop {} has no descriptor", loop_index)))
    }

    fn end_marker_id(&self, loop_index: usize, sequence: &QuestionSequence) -> Option<String> {
        self.loops
            .iter()
            .find(|d| d.loop_index == loop_index)
            .and_then(|d| sequence.at(d.end_marker_index))
            .map(|record| record.id.clone())
    }
}

/// Skip targets of the selected options whose guards pass, in declaration order
fn selected_skip_targets(record: &QuestionRecord, env: NavigationEnv<'_>) -> Vec<String> {
    if record.directives.skip_targets.is_empty() {
        return Vec::new();
    }
    let selected: BTreeSet<String> = [RADIO_KEY, CHECKBOX_KEY]
        .iter()
        .filter_map(|key| env.source.resolve(&compound_key(key, &record.id)))
        .flat_map(|value| match value {
            Value::List(items) => items.iter().map(|v| v.to_string()).collect(),
            other => vec![other.to_string()],
        })
        .collect();

    record
        .directives
        .skip_targets
        .iter()
        .filter(|skip| selected.contains(&skip.option_value))
        .filter(|skip| {
            skip.directive
                .guard
                .as_ref()
                .is_none_or(|guard| env.evaluator.condition(guard, env.source))
        })
        .map(|skip| skip.directive.target.clone())
        .collect()
}
