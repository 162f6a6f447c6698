use crate::ast::Span;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Detailed error information with source location
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub span: Span,
    pub source_id: String,
    pub source_text: Arc<str>,
    pub suggestion: Option<String>,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        write!(f, " at {}:{}:{}", self.source_id, self.span.line, self.span.col)
    }
}

/// Error types for the survey engine
#[derive(Debug, Clone, Error)]
pub enum SurveyError {
    /// Definition text could not be parsed
    #[error("Parse error: {0}")]
    Parse(Box<ErrorDetails>),

    /// Compilation produced no question records
    #[error("Survey '{0}' compiled to an empty question sequence")]
    EmptySurvey(String),

    /// Expression rejected by both the grammar and the legacy reducer
    #[error("Expression error in '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// A loop bound whose source answer is missing or not numeric
    #[error("Loop {loop_index} bound source '{source_id}' is not numeric (found '{found}')")]
    LoopBound {
        loop_index: usize,
        source_id: String,
        found: String,
    },

    /// Navigation requested without a valid target
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Persistence callback failed or returned a non-success code
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialized state could not be read back
    #[error("State error: {0}")]
    State(String),

    #[error("Resource limit exceeded: {limit_name} (limit: {limit_value}, actual: {actual_value}). {suggestion}")]
    ResourceLimitExceeded {
        limit_name: String,
        limit_value: String,
        actual_value: String,
        suggestion: String,
    },
}

impl SurveyError {
    /// Create a parse error with source information
    pub fn parse(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Parse(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: None,
        }))
    }

    /// Create a parse error with suggestion
    pub fn parse_with_suggestion(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Parse(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: Some(suggestion.into()),
        }))
    }

    pub fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SurveyError {
    fn from(err: serde_json::Error) -> Self {
        SurveyError::State(err.to_string())
    }
}
