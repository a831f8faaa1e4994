//! Eligibility and proration.
//!
//! An employee whose eligibility window only partly covers the incentive
//! period earns a share of the payout proportional to the eligible days.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{AuditStep, DateRange, Employee, Percentage};

/// Decimal places kept on a proration factor.
pub const PRORATION_SCALE: u32 = 4;

/// How much of the period the employee was eligible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Eligible for the whole period.
    Full,
    /// Eligible for part of the period; the payout is scaled by `factor`.
    Partial {
        /// The eligible part of the period.
        window: DateRange,
        /// Eligible days / period days × 100.
        factor: Percentage,
    },
    /// Not eligible on any day of the period.
    Ineligible {
        /// Why the employee is not eligible.
        reason: String,
    },
}

/// The result of an eligibility check, including the audit step.
#[derive(Debug, Clone)]
pub struct EligibilityResult {
    /// The eligibility outcome.
    pub eligibility: Eligibility,
    /// The audit step recording this check.
    pub audit_step: AuditStep,
}

/// Computes `eligible_days / period_days × 100`, rounded to
/// [`PRORATION_SCALE`] places and kept inside `(0, 100]`.
///
/// # Example
///
/// ```
/// use incentive_engine::calculation::proration_factor;
/// use rust_decimal::Decimal;
///
/// let factor = proration_factor(15, 31);
/// assert_eq!(factor.value(), Decimal::new(483871, 4));
/// ```
pub fn proration_factor(eligible_days: i64, period_days: i64) -> Percentage {
    let smallest = Decimal::new(1, PRORATION_SCALE);
    if period_days <= 0 || eligible_days >= period_days {
        return Percentage::HUNDRED;
    }
    let raw = Decimal::from(eligible_days.max(0)) * Decimal::ONE_HUNDRED
        / Decimal::from(period_days);
    let rounded = raw
        .round_dp_with_strategy(PRORATION_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .max(smallest)
        .min(Decimal::ONE_HUNDRED);
    Percentage::new(rounded).unwrap_or(Percentage::HUNDRED)
}

/// Determines the employee's eligibility during `period`.
pub fn determine_eligibility(
    employee: &Employee,
    period: &DateRange,
    step_number: u32,
) -> EligibilityResult {
    let input = serde_json::json!({
        "employee_id": employee.id,
        "eligible_from": employee.eligible_from.to_string(),
        "eligible_until": employee.eligible_until.map(|d| d.to_string()),
        "period": period.label(),
    });

    let (eligibility, output, reasoning) = match employee.eligible_window(period) {
        None => {
            let reason = format!(
                "Employee {} has no eligible days in {}",
                employee.id,
                period.label()
            );
            (
                Eligibility::Ineligible {
                    reason: reason.clone(),
                },
                serde_json::json!({"eligible_days": 0}),
                reason,
            )
        }
        Some(window) if window == *period => (
            Eligibility::Full,
            serde_json::json!({
                "eligible_days": window.days(),
                "prorata_factor": null,
            }),
            format!(
                "Eligible for all {} days of {}; no proration",
                period.days(),
                period.label()
            ),
        ),
        Some(window) => {
            let factor = proration_factor(window.days(), period.days());
            (
                Eligibility::Partial { window, factor },
                serde_json::json!({
                    "eligible_days": window.days(),
                    "eligible_window": window.label(),
                    "prorata_factor": factor.value().to_string(),
                }),
                format!(
                    "Eligible for {} of {} days ({}); payout prorated to {}",
                    window.days(),
                    period.days(),
                    window.label(),
                    factor
                ),
            )
        }
    };

    EligibilityResult {
        eligibility,
        audit_step: AuditStep {
            step_number,
            rule_id: "eligibility".to_string(),
            rule_name: "Eligibility and Proration".to_string(),
            input,
            output,
            reasoning,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, Money};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn january() -> DateRange {
        DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap()
    }

    fn employee(from: NaiveDate, until: Option<NaiveDate>) -> Employee {
        Employee {
            id: "emp_001".to_string(),
            name: "Asha".to_string(),
            base_salary: Money::new(Decimal::from(50000), Currency::new("INR").unwrap()),
            eligible_from: from,
            eligible_until: until,
        }
    }

    #[test]
    fn test_full_period_is_not_prorated() {
        let result = determine_eligibility(&employee(date(2024, 6, 1), None), &january(), 1);
        assert_eq!(result.eligibility, Eligibility::Full);
        assert_eq!(result.audit_step.rule_id, "eligibility");
    }

    #[test]
    fn test_mid_period_joiner_is_prorated() {
        let result = determine_eligibility(&employee(date(2025, 1, 17), None), &january(), 1);
        match result.eligibility {
            Eligibility::Partial { window, factor } => {
                assert_eq!(window.days(), 15);
                assert_eq!(factor.value(), Decimal::new(483871, 4));
            }
            other => panic!("Expected Partial, got {:?}", other),
        }
    }

    #[test]
    fn test_leaver_before_period_is_ineligible() {
        let result = determine_eligibility(
            &employee(date(2024, 1, 1), Some(date(2024, 12, 31))),
            &january(),
            1,
        );
        assert!(matches!(result.eligibility, Eligibility::Ineligible { .. }));
    }

    #[test]
    fn test_factor_bounds() {
        assert_eq!(proration_factor(31, 31), Percentage::HUNDRED);
        assert_eq!(proration_factor(1, 2).value(), Decimal::from(50));
        assert_eq!(
            proration_factor(1, 10_000_000).value(),
            Decimal::new(1, PRORATION_SCALE)
        );
    }
}
