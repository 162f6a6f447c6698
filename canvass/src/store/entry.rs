use crate::evaluator::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One answer: a single value or a checkbox selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Scalar(String),
    List(Vec<String>),
}

impl ResponseValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        ResponseValue::Scalar(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResponseValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResponseValue::Scalar(s) => s.is_empty(),
            ResponseValue::List(items) => items.is_empty(),
        }
    }

    /// Every selected value, one for a scalar
    pub fn values(&self) -> Vec<&str> {
        match self {
            ResponseValue::Scalar(s) => vec![s.as_str()],
            ResponseValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values().contains(&value)
    }

    /// Read a JSON leaf written by an older survey version
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(ResponseValue::Scalar(s.clone())),
            serde_json::Value::Number(n) => Some(ResponseValue::Scalar(n.to_string())),
            serde_json::Value::Bool(b) => Some(ResponseValue::Scalar(b.to_string())),
            serde_json::Value::Array(items) => Some(ResponseValue::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        serde_json::Value::String(s) => Some(s.clone()),
                        serde_json::Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect(),
            )),
            _ => None,
        }
    }
}

impl From<ResponseValue> for Value {
    fn from(value: ResponseValue) -> Self {
        match value {
            ResponseValue::Scalar(s) => Value::Text(s),
            ResponseValue::List(items) => Value::List(items.into_iter().map(Value::Text).collect()),
        }
    }
}

impl From<&str> for ResponseValue {
    fn from(value: &str) -> Self {
        ResponseValue::Scalar(value.to_string())
    }
}

/// Everything stored for one question
///
/// Single-field questions store a bare value; multi-field questions store a
/// map keyed by field key (grid rows, other-text, XOR groups).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEntry {
    Single(ResponseValue),
    Keyed(BTreeMap<String, ResponseValue>),
}

impl ResponseEntry {
    /// Value of `field`; a single-value entry answers for any field
    pub fn field(&self, field: &str) -> Option<&ResponseValue> {
        match self {
            ResponseEntry::Single(value) => Some(value),
            ResponseEntry::Keyed(map) => map.get(field),
        }
    }

    /// Value standing for the whole question
    pub fn primary(&self) -> Option<&ResponseValue> {
        match self {
            ResponseEntry::Single(value) => Some(value),
            ResponseEntry::Keyed(map) if map.len() == 1 => map.values().next(),
            ResponseEntry::Keyed(map) => map
                .get(crate::compiler::record::RADIO_KEY)
                .or_else(|| map.get(crate::compiler::record::CHECKBOX_KEY)),
        }
    }
}
