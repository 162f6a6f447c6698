//! Year-month values
//!
//! Month inputs and `ym(...)` produce a `YearMonth`; adding or subtracting a
//! number shifts it by whole months, subtracting two gives the month distance.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MONTHS_PER_YEAR: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Shift by `months`, which may be negative
    pub fn add_months(self, months: i64) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        let shifted = if months >= 0 {
            first.checked_add_months(Months::new(u32::try_from(months).ok()?))
        } else {
            first.checked_sub_months(Months::new(u32::try_from(-months).ok()?))
        }?;
        Some(Self::from_date(shifted))
    }

    /// Signed number of months from `self` to `other`
    pub fn months_until(self, other: YearMonth) -> i64 {
        (i64::from(other.year) - i64::from(self.year)) * MONTHS_PER_YEAR
            + (i64::from(other.month) - i64::from(self.month))
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts `YYYY-MM`, `YYYY/MM` and full `YYYY-MM-DD` dates
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }
        let (year, month) = s
            .split_once(['-', '/'])
            .ok_or_else(|| format!("'{}' is not a year-month", s))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| format!("'{}' has no valid year", s))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("'{}' has no valid month", s))?;
        Self::new(year, month).ok_or_else(|| format!("'{}' is out of range", s))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
