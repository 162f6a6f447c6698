//! # Canvass
//!
//! **Branching, loopable surveys from plain text**
//!
//! Canvass compiles a plaintext survey definition into an ordered sequence of
//! questions, renders each question to markup on demand, and drives a
//! respondent through it: skip targets, display conditions, bounded loops and
//! mandatory answers are resolved against the answers given so far.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canvass::{MemoryPersistence, ResponseValue, SessionConfig, SurveyResult, SurveySession};
//!
//! fn main() -> SurveyResult<()> {
//!     let definition = r#"
//! [Q1!] Do you own a car?
//! (1) Yes
//! (0) No -> END
//! [Q2] How many?
//! {number min=1 max=10}
//! [END] Thank you
//! "#;
//!     let mut session = SurveySession::compile(
//!         definition,
//!         "cars",
//!         SessionConfig::default(),
//!         MemoryPersistence::new(),
//!     )?;
//!
//!     session.start()?;
//!     session.set_field("choice", ResponseValue::scalar("1"))?;
//!     session.advance()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Questions
//! A question starts at a bracketed upper-case id at the start of a line and
//! runs to the next one. Options after the id carry its display condition,
//! mandate and end flag.
//!
//! ### Loops and grids
//! `<loop bound=ID max=N>` blocks are unrolled before segmentation; the answer
//! to `ID` decides how many iterations run. `|grid ...|` blocks become tables
//! whose rows share one set of response options.
//!
//! ### Responses
//! Answers live in a response store with a committed half (stored by the host)
//! and a pending half (edits on the question shown). Transitions commit
//! optimistically and roll back when storing fails.

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod navigation;
pub mod parser;
pub mod resource_limits;
pub mod session;
pub mod store;
pub mod syntax;

pub use ast::Span;
pub use compiler::{compile, QuestionRecord, QuestionSequence, SurveyContext};
pub use config::SessionConfig;
pub use error::{ErrorDetails, SurveyError};
pub use evaluator::{Evaluator, Value, ValueSource, YearMonth};
pub use navigation::{GateOutcome, NavigationHistory, NavigationState, Navigator};
pub use resource_limits::ResourceLimits;
pub use session::{Deferred, Notice, SurveySession, Transition};
pub use store::{
    ChangeSet, MemoryPersistence, Persistence, ResponseEntry, ResponseStore, ResponseValue,
    StoreReceipt,
};

/// Result type for survey operations
pub type SurveyResult<T> = Result<T, SurveyError>;

#[cfg(test)]
mod tests;
