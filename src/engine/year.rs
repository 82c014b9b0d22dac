//! The year matcher every command optionally carries: a gate on the
//! current simulation year, independent of any particular stream.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearMatcher {
    Range(i32, i32),
    Set(Vec<i32>),
}

impl YearMatcher {
    pub fn range(start: i32, end: i32) -> Self {
        YearMatcher::Range(start.min(end), start.max(end))
    }

    pub fn set(years: Vec<i32>) -> Self {
        YearMatcher::Set(years)
    }

    pub fn matches(&self, year: i32) -> bool {
        match self {
            YearMatcher::Range(start, end) => year >= *start && year <= *end,
            YearMatcher::Set(years) => years.contains(&year),
        }
    }
}
