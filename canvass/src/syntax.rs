//! Syntax tree for survey definitions and condition expressions
//!
//! The survey parser produces one `ParsedQuestion` per boundary; each body is
//! parsed into a `QuestionBody` of typed lines and inline nodes. Expressions are
//! parsed into `Expr` independently of any question.

use crate::ast::Span;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Mandatory-answer mode of a question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mandate {
    #[default]
    Optional,
    /// Advance is refused but the respondent may continue anyway
    Soft,
    /// Advance is refused
    Hard,
}

/// Loop annotation carried by the first question of every iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopEntry {
    pub loop_index: usize,
    pub bound_source: String,
    pub hard_max: u32,
    pub iteration: u32,
    pub base_id: String,
}

/// Skip directive attached to a response option: `-> TARGET [if expr]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipDirective {
    pub target: String,
    pub guard: Option<String>,
}

/// Skip directive together with the option value that triggers it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipTarget {
    pub option_value: String,
    pub directive: SkipDirective,
}

/// Parsed flags of a question
///
/// Expressions are kept as source strings; they are evaluated at render or
/// navigation time against live answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Directives {
    pub display_if: Option<String>,
    pub is_end: bool,
    pub mandate: Mandate,
    pub loop_entry: Option<LoopEntry>,
    pub grid: bool,
    pub skip_targets: Vec<SkipTarget>,
    pub extra: Vec<(String, Option<String>)>,
}

/// One boundary plus the raw text up to the next boundary
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestion {
    pub id: String,
    pub directives: Directives,
    pub body: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBody {
    pub lines: Vec<BodyLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyLine {
    Text(Vec<Inline>),
    Choice(ChoiceOption),
}

/// How a response option behaves inside its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    /// Radio button; one value per question
    Exclusive,
    /// Checkbox; any number of values
    Inclusive,
    /// Checkbox that clears every other checkbox of the group
    Sole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    pub kind: ChoiceKind,
    pub value: String,
    pub label: Vec<Inline>,
    pub skips: Vec<SkipDirective>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    /// `{#expr}`, resolved after rendering
    Computed(String),
    /// `{@name}`, substituted at render time
    ContextVar(String),
    Field(FieldMarker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextArea,
    Number,
    Date,
    Month,
    Other,
}

impl FieldKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::TextArea => "textarea",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Month => "month",
            FieldKind::Other => "other",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "text" => FieldKind::Text,
            "textarea" => FieldKind::TextArea,
            "number" => FieldKind::Number,
            "date" => FieldKind::Date,
            "month" => FieldKind::Month,
            "other" => FieldKind::Other,
            _ => return None,
        })
    }
}

/// An inline input marker with its resolved field key
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMarker {
    pub kind: FieldKind,
    pub key: String,
    pub min: Option<String>,
    pub max: Option<String>,
    pub display_if: Option<String>,
    pub disabled: bool,
    pub xor_group: Option<String>,
}

/// Tabular question compiled straight from a grid block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridTable {
    pub id: String,
    pub shared_text: String,
    pub rows: Vec<GridRow>,
    pub columns: Vec<GridColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    pub id: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridColumnKind {
    Radio,
    Checkbox,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridColumn {
    pub value: String,
    pub label: String,
    pub kind: GridColumnKind,
}

/// Condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Decimal),
    Text(String),
    Boolean(bool),
    Null,
    /// Reserved loop-index marker left over outside a loop body
    LoopIndex,
    /// Response identifier, optionally compound (`field.QUESTION`)
    Reference(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Nesting depth of the expression tree
    pub fn depth(&self) -> usize {
        match self {
            Expr::Unary(_, inner) => 1 + inner.depth(),
            Expr::Binary(left, _, right) => 1 + left.depth().max(right.depth()),
            Expr::Call(_, args) => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        };
        write!(f, "{}", symbol)
    }
}
