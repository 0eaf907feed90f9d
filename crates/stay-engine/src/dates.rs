//! Half-open calendar-date arithmetic shared by every other module.
//!
//! Every stay, reservation and blocked range is a `[start, end)` interval of
//! calendar dates: the start night is occupied, the end date is the checkout
//! morning and is free for the next arrival. Two ranges overlap iff
//! `a.start < b.end && b.start < a.end`, so back-to-back stays never conflict.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StayError};

/// Boundary date format (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A validated half-open range of calendar dates, `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `end <= start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(StayError::Validation(format!(
                "end date {} must be after start date {}",
                format_date(end),
                format_date(start)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both boundaries from `YYYY-MM-DD` strings and validate ordering.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// Number of nights covered (the count of dates in `[start, end)`).
    pub fn nights(&self) -> i64 {
        nights(self.start, self.end)
    }

    /// Whether this range overlaps `other` under half-open semantics.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Whether `date` falls inside `[start, end)`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// The overlapping part of two ranges, if any.
    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(DateRange { start, end })
    }

    /// Every date in `[start, end)`, ascending.
    pub fn days(&self) -> Vec<NaiveDate> {
        enumerate_days(self.start, self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_date(self.start), format_date(self.end))
    }
}

/// Two half-open ranges overlap iff `a_start < b_end && b_start < a_end`.
///
/// Ranges that merely touch (`a_end == b_start`) do not overlap.
pub fn overlaps(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start < b_end && b_start < a_end
}

/// Every date from `start` (inclusive) to `end` (exclusive). Empty when `end <= start`.
pub fn enumerate_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d < end).collect()
}

/// Nights between two dates; zero or negative when the range is empty or inverted.
pub fn nights(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Parse a `YYYY-MM-DD` boundary value.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| StayError::Validation(format!("invalid date '{}', expected YYYY-MM-DD", value)))
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `date + n` calendar days, saturating at chrono's maximum date.
pub fn add_days(date: NaiveDate, n: u64) -> NaiveDate {
    date.checked_add_days(Days::new(n)).unwrap_or(NaiveDate::MAX)
}

/// `date - n` calendar days, saturating at chrono's minimum date.
pub fn sub_days(date: NaiveDate, n: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
}
