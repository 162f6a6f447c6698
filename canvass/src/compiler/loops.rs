use crate::ast::iteration_id;
use crate::error::SurveyError;
use crate::evaluator::ValueSource;
use crate::SurveyResult;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::error;

/// Runtime view of one unrolled loop block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopDescriptor {
    pub loop_index: usize,
    /// Sequence position of the first iteration's first question
    pub location_index: usize,
    pub bound_source_id: String,
    pub hard_max: u32,
    /// Iterations the respondent's answer allows, never above `hard_max`
    pub current_bound: Option<u32>,
    pub first_question_base_id: String,
    /// Sequence position of the end-of-loop marker
    pub end_marker_index: usize,
}

impl LoopDescriptor {
    /// Re-read the bound from the live answer and clamp it to `hard_max`
    pub fn refresh_bound(&mut self, source: &dyn ValueSource) -> SurveyResult<u32> {
        let found = source.resolve(&self.bound_source_id);
        let bound = found
            .as_ref()
            .and_then(|value| value.as_number())
            .filter(|n| !n.is_sign_negative() && n.fract().is_zero())
            .and_then(|n| n.to_u32());

        match bound {
            Some(bound) => {
                let clamped = bound.min(self.hard_max);
                self.current_bound = Some(clamped);
                Ok(clamped)
            }
            None => {
                let found = found.map(|v| v.to_string()).unwrap_or_default();
                error!(
                    loop_index = self.loop_index,
                    source = %self.bound_source_id,
                    found = %found,
                    "loop bound is not numeric"
                );
                Err(SurveyError::LoopBound {
                    loop_index: self.loop_index,
                    source_id: self.bound_source_id.clone(),
                    found,
                })
            }
        }
    }

    /// Id of the first question of `iteration`
    pub fn iteration_entry(&self, iteration: u32) -> String {
        iteration_id(&self.first_question_base_id, iteration)
    }

    /// Whether `iteration` runs under `bound`
    pub fn admits(&self, iteration: u32, bound: u32) -> bool {
        iteration <= bound && iteration <= self.hard_max
    }
}
