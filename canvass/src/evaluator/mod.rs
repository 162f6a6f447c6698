//! Condition and computed-value evaluation
//!
//! Expressions are parsed with the expression grammar and walked. Input the
//! grammar rejects falls back to positional-call reduction, which only knows
//! the two-argument legacy functions. Evaluation never mutates state.

pub mod expression;
pub mod functions;
pub mod legacy;
pub mod operations;
pub mod value;
pub mod yearmonth;

use crate::error::SurveyError;
use crate::parser::expressions::{parse_expression, ExpressionParseError};
use crate::resource_limits::ResourceLimits;
use crate::SurveyResult;
use functions::FunctionRegistry;
use std::collections::HashMap;
use tracing::{debug, warn};
pub use value::Value;
pub use yearmonth::YearMonth;

/// Resolves response identifiers during evaluation
pub trait ValueSource {
    /// `None` when nothing is stored under the token
    fn resolve(&self, token: &str) -> Option<Value>;
}

impl ValueSource for HashMap<String, Value> {
    fn resolve(&self, token: &str) -> Option<Value> {
        self.get(token).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    functions: FunctionRegistry,
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(&ResourceLimits::default())
    }
}

impl Evaluator {
    pub fn new(limits: &ResourceLimits) -> Self {
        Self {
            functions: FunctionRegistry::new(),
            max_depth: limits.max_expression_depth,
        }
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Evaluate an expression to a value
    pub fn evaluate(&self, expression: &str, source: &dyn ValueSource) -> SurveyResult<Value> {
        match parse_expression(expression, self.max_depth) {
            Ok(expr) => expression::evaluate_expression(&expr, &self.functions, source)
                .map_err(|message| SurveyError::expression(expression, message)),
            Err(ExpressionParseError::Syntax(reason)) => {
                debug!(expression, %reason, "grammar rejected expression, reducing positionally");
                legacy::reduce(expression, &self.functions, source).map_err(|failure| {
                    warn!(
                        expression,
                        tokens = %failure.stack,
                        "legacy reduction failed: {}",
                        failure.message
                    );
                    SurveyError::expression(
                        expression,
                        format!("{}; positional reduction: {}", reason, failure.message),
                    )
                })
            }
            Err(ExpressionParseError::TooDeep { depth, limit }) => {
                Err(SurveyError::ResourceLimitExceeded {
                    limit_name: "max_expression_depth".to_string(),
                    limit_value: limit.to_string(),
                    actual_value: depth.to_string(),
                    suggestion: "Split the condition into smaller computed questions".to_string(),
                })
            }
        }
    }

    /// Evaluate as a boolean; any failure is logged and reads as false
    pub fn condition(&self, expression: &str, source: &dyn ValueSource) -> bool {
        match self.evaluate(expression, source) {
            Ok(value) => value.truthy(),
            Err(err) => {
                warn!(expression, error = %err, "condition evaluated as false");
                false
            }
        }
    }
}
