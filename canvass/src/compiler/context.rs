//! Context variables substituted into `{@name}` markers
//!
//! Values are captured once when a session starts so every question renders
//! against the same date, whichever thread compiles it.

use chrono::{Datelike, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyContext {
    values: BTreeMap<String, String>,
}

impl SurveyContext {
    /// Capture the current local date and time
    pub fn capture(user: Option<&str>) -> Self {
        Self::at(Local::now().naive_local(), user)
    }

    pub fn at(now: NaiveDateTime, user: Option<&str>) -> Self {
        let date = now.date();
        let mut values = BTreeMap::new();
        values.insert("today".to_string(), date.format("%Y-%m-%d").to_string());
        values.insert("year".to_string(), date.year().to_string());
        values.insert("month".to_string(), date.month().to_string());
        values.insert("month_name".to_string(), date.format("%B").to_string());
        values.insert("yearmonth".to_string(), date.format("%Y-%m").to_string());
        values.insert("weekday".to_string(), date.format("%A").to_string());
        values.insert("time".to_string(), now.format("%H:%M").to_string());
        if let Some(user) = user {
            values.insert("user".to_string(), user.to_string());
        }
        Self { values }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
