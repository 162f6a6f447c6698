//! Source metadata shared by the parsers
//!
//! - `Span` for tracking locations inside a survey definition
//! - reserved question ids and the synthetic loop marker ids

use std::fmt;

/// Span representing a location in the definition text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn from_pest_span(span: pest::Span) -> Self {
        let (line, col) = span.start_pos().line_col();
        Self {
            start: span.start(),
            end: span.end(),
            line,
            col,
        }
    }

    /// Shift a span produced by a sub-parse back into definition coordinates
    pub fn offset(&self, base: usize) -> Self {
        Self {
            start: self.start + base,
            end: self.end + base,
            line: self.line,
            col: self.col,
        }
    }
}

/// Id of the reserved terminal question
pub const TERMINAL_ID: &str = "END";

/// Loop-index token; only meaningful inside a loop body before unrolling
pub const LOOP_INDEX_TOKEN: &str = "$i";

const CONTINUATION_PREFIX: &str = "__CONT_";
const END_OF_LOOP_PREFIX: &str = "__ENDLOOP_";

/// Synthetic loop markers inserted by loop expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopMarker {
    /// Placed after every iteration; drives the loop-exit decision
    Continuation { loop_index: usize, iteration: u32 },
    /// Placed once after the final iteration
    EndOfLoop { loop_index: usize },
}

impl LoopMarker {
    pub fn parse(id: &str) -> Option<Self> {
        if let Some(rest) = id.strip_prefix(CONTINUATION_PREFIX) {
            let (loop_part, iteration_part) = rest.split_once('_')?;
            return Some(LoopMarker::Continuation {
                loop_index: loop_part.parse().ok()?,
                iteration: iteration_part.parse().ok()?,
            });
        }
        id.strip_prefix(END_OF_LOOP_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .map(|loop_index| LoopMarker::EndOfLoop { loop_index })
    }

    pub fn is_continuation(id: &str) -> bool {
        matches!(Self::parse(id), Some(LoopMarker::Continuation { .. }))
    }

    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LoopMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMarker::Continuation {
                loop_index,
                iteration,
            } => write!(f, "{}{}_{}", CONTINUATION_PREFIX, loop_index, iteration),
            LoopMarker::EndOfLoop { loop_index } => {
                write!(f, "{}{}", END_OF_LOOP_PREFIX, loop_index)
            }
        }
    }
}

/// Question id of iteration `iteration` of a loop-scoped id stem: `{id}_{i}_{i}`
pub fn iteration_id(base: &str, iteration: u32) -> String {
    format!("{}_{}_{}", base, iteration, iteration)
}

/// Whether `token` has the shape of a question identifier
pub fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
