//! Inclusive date ranges used for incentive periods and plan validity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// An inclusive range of calendar dates.
///
/// # Example
///
/// ```
/// use incentive_engine::models::DateRange;
/// use chrono::NaiveDate;
///
/// let january = DateRange::new(
///     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
/// ).unwrap();
///
/// assert_eq!(january.days(), 31);
/// assert_eq!(january.label(), "2025-01-01..2025-01-31");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// The first day of the range.
    pub start: NaiveDate,
    /// The last day of the range.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting an end before the start.
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Checks that the range is not inverted.
    ///
    /// Ranges that arrive through deserialization bypass [`DateRange::new`],
    /// so callers validate them at the boundary.
    pub fn validate(&self) -> EngineResult<()> {
        if self.end < self.start {
            return Err(EngineError::validation(
                "period",
                format!("end {} is before start {}", self.end, self.start),
            ));
        }
        Ok(())
    }

    /// Number of days in the range, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Returns true if the date falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns true if `other` lies entirely inside this range.
    pub fn covers(&self, other: &DateRange) -> bool {
        self.contains(other.start) && self.contains(other.end)
    }

    /// Returns the intersection of two ranges, if any.
    pub fn overlap(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateRange { start, end })
    }

    /// A stable human-readable label.
    pub fn label(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }
}
