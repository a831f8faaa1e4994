//! Employee model.
//!
//! Employees are supplied by an external provider; the engine only reads the
//! base salary (which also fixes the currency of every calculation) and the
//! eligibility window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DateRange, Money};

/// Represents an employee enrolled in incentive plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// The base salary the incentive is computed against.
    pub base_salary: Money,
    /// First day the employee is eligible for incentives.
    pub eligible_from: NaiveDate,
    /// Last day of eligibility, if the employee has left or been moved off the plan.
    #[serde(default)]
    pub eligible_until: Option<NaiveDate>,
}

impl Employee {
    /// Returns the part of `period` during which the employee is eligible.
    ///
    /// # Examples
    ///
    /// ```
    /// use incentive_engine::models::{Currency, DateRange, Employee, Money};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let employee = Employee {
    ///     id: "emp_001".to_string(),
    ///     name: "Asha".to_string(),
    ///     base_salary: Money::new(Decimal::from(50000), Currency::new("INR").unwrap()),
    ///     eligible_from: NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
    ///     eligible_until: None,
    /// };
    /// let january = DateRange::new(
    ///     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    ///     NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
    /// ).unwrap();
    ///
    /// let window = employee.eligible_window(&january).unwrap();
    /// assert_eq!(window.days(), 15);
    /// ```
    pub fn eligible_window(&self, period: &DateRange) -> Option<DateRange> {
        let until = self.eligible_until.unwrap_or(NaiveDate::MAX);
        if until < self.eligible_from {
            return None;
        }
        let eligibility = DateRange {
            start: self.eligible_from,
            end: until,
        };
        eligibility.overlap(period)
    }
}
