use super::yearmonth::YearMonth;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Scalar produced by expression evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
    List(Vec<Value>),
    YearMonth(YearMonth),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Missing, empty text, or empty list
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::Text(s) => !s.is_empty() && s != "false",
            Value::List(items) => !items.is_empty(),
            Value::YearMonth(_) => true,
        }
    }

    /// Numeric view of the value, parsing text when it looks like a number
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(Decimal::from(u8::from(*b))),
            Value::Text(s) => Decimal::from_str(s.trim()).ok(),
            Value::List(items) if items.len() == 1 => items[0].as_number(),
            _ => None,
        }
    }

    pub fn as_year_month(&self) -> Option<YearMonth> {
        match self {
            Value::YearMonth(ym) => Some(*ym),
            Value::Text(s) => YearMonth::from_str(s).ok(),
            _ => None,
        }
    }

    /// Equality with numeric and year-month coercion; a list equals a scalar it contains
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, v) | (v, Value::Null) => v.is_empty(),
            (Value::List(items), Value::List(others)) => {
                let mut left: Vec<String> = items.iter().map(Value::to_string).collect();
                let mut right: Vec<String> = others.iter().map(Value::to_string).collect();
                left.sort();
                right.sort();
                left == right
            }
            (Value::List(items), scalar) | (scalar, Value::List(items)) => {
                items.iter().any(|item| item.loose_eq(scalar))
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::YearMonth(_), _) | (_, Value::YearMonth(_)) => {
                match (self.as_year_month(), other.as_year_month()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self.to_string() == other.to_string(),
            },
        }
    }

    /// Ordering used by the relational operators
    pub fn loose_cmp(&self, other: &Value) -> Ordering {
        if matches!(self, Value::YearMonth(_)) || matches!(other, Value::YearMonth(_)) {
            if let (Some(a), Some(b)) = (self.as_year_month(), other.as_year_month()) {
                return a.cmp(&b);
            }
        }
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n.normalize()),
            Value::Text(s) => write!(f, "{}", s),
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::YearMonth(ym) => write!(f, "{}", ym),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
