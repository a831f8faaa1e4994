//! The full payout computation for one employee and period.
//!
//! `compute_payout` is pure: it reads the plan and employee and returns the
//! amounts plus the rule trace. Recording the result on a [`Calculation`]
//! drives the aggregate through the matching transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, Calculation, DateRange, Employee, IncentivePlan, Money, Percentage, RevisedPayout,
};

use super::achievement::calculate_achievement;
use super::payout::{GrossPayout, calculate_gross_payout, effective_cap};
use super::proration::{Eligibility, determine_eligibility};

/// How a computation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    /// A payout is due.
    Payable,
    /// Achievement missed the threshold or every slab.
    BelowThreshold,
    /// The employee had no eligible days in the period.
    Ineligible {
        /// Why the employee is not eligible.
        reason: String,
    },
}

/// Everything a payout computation produced.
#[derive(Debug, Clone)]
pub struct PayoutComputation {
    /// How the computation ended.
    pub outcome: PayoutOutcome,
    /// Achievement percentage.
    pub achievement: Percentage,
    /// The actual value the computation was run on.
    pub actual_value: Decimal,
    /// Gross incentive; zero unless payable.
    pub gross: Money,
    /// Proration factor for partial eligibility.
    pub prorata_factor: Option<Percentage>,
    /// Effective payout ceiling.
    pub cap: Option<Money>,
    /// Net incentive after proration and the cap.
    pub net: Money,
    /// The slab that priced the payout.
    pub applied_slab_id: Option<Uuid>,
    /// Rule trace, one step per rule applied.
    pub audit_trace: Vec<AuditStep>,
}

/// Computes the payout for `employee` under `plan` for `period`.
///
/// Steps run in order: eligibility, achievement, gross payout, cap. The
/// computation stops at the first step that rules a payout out.
///
/// # Errors
///
/// Returns a validation error if the period is outside the plan's effective
/// dates, the target is not positive, or `actual` is negative, and
/// [`EngineError::CurrencyMismatch`] if a plan cap is in another currency.
pub fn compute_payout(
    plan: &IncentivePlan,
    employee: &Employee,
    period: &DateRange,
    actual: Decimal,
) -> EngineResult<PayoutComputation> {
    period.validate()?;
    if plan.effective.overlap(period).is_none() {
        return Err(EngineError::validation(
            "period",
            format!(
                "{} is outside plan {} effective dates {}",
                period.label(),
                plan.id,
                plan.effective.label()
            ),
        ));
    }

    let base = &employee.base_salary;
    let zero = Money::zero(base.currency.clone());
    let mut trace = Vec::new();

    let eligibility = determine_eligibility(employee, period, 1);
    trace.push(eligibility.audit_step);
    let achievement = calculate_achievement(actual, &plan.target, 2)?;
    trace.push(achievement.audit_step.clone());

    let mut computation = PayoutComputation {
        outcome: PayoutOutcome::Payable,
        achievement: achievement.achievement,
        actual_value: actual,
        gross: zero.clone(),
        prorata_factor: None,
        cap: None,
        net: zero,
        applied_slab_id: None,
        audit_trace: Vec::new(),
    };

    let prorata_factor = match eligibility.eligibility {
        Eligibility::Ineligible { reason } => {
            computation.outcome = PayoutOutcome::Ineligible { reason };
            computation.audit_trace = trace;
            return Ok(computation);
        }
        Eligibility::Partial { factor, .. } => Some(factor),
        Eligibility::Full => None,
    };

    if !achievement.meets_threshold {
        computation.outcome = PayoutOutcome::BelowThreshold;
        computation.audit_trace = trace;
        return Ok(computation);
    }

    let gross = calculate_gross_payout(plan, base, achievement.achievement, 3)?;
    trace.push(gross.audit_step);
    let (gross, applied_slab_id) = match gross.payout {
        GrossPayout::Payable {
            gross,
            applied_slab_id,
        } => (gross, applied_slab_id),
        GrossPayout::NoMatchingSlab => {
            computation.outcome = PayoutOutcome::BelowThreshold;
            computation.audit_trace = trace;
            return Ok(computation);
        }
    };

    let cap = effective_cap(&plan.caps, base, 4)?;
    trace.push(cap.audit_step);

    let prorated = match prorata_factor {
        Some(factor) => gross.percent_of(factor)?,
        None => gross.clone(),
    };
    let net = match &cap.cap {
        Some(cap) => prorated.min(cap.clone())?,
        None => prorated,
    };

    computation.gross = gross;
    computation.prorata_factor = prorata_factor;
    computation.cap = cap.cap;
    computation.net = net;
    computation.applied_slab_id = applied_slab_id;
    computation.audit_trace = trace;
    Ok(computation)
}

impl PayoutComputation {
    /// Drives a pending calculation through the transitions matching this
    /// computation and records the rule trace.
    pub fn record_on(&self, calc: &mut Calculation, now: DateTime<Utc>) -> EngineResult<()> {
        match &self.outcome {
            PayoutOutcome::Ineligible { reason } => calc.mark_ineligible(reason, now)?,
            PayoutOutcome::BelowThreshold => calc.mark_below_threshold(now)?,
            PayoutOutcome::Payable => {
                calc.calculate(self.gross.clone(), self.applied_slab_id, now)?;
                self.apply_adjustments(calc, now)?;
            }
        }
        calc.record_trace(self.audit_trace.clone());
        Ok(())
    }

    /// Records this computation as a recalculation of an existing calculation.
    ///
    /// # Errors
    ///
    /// An ineligible result cannot be recorded as a recalculation; the
    /// calculation has to be voided instead.
    pub fn record_recalculation_on(
        &self,
        calc: &mut Calculation,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if let PayoutOutcome::Ineligible { reason } = &self.outcome {
            return Err(EngineError::validation("eligibility", reason.clone()));
        }
        calc.recalculate(
            self.actual_value,
            self.gross.clone(),
            self.gross.clone(),
            self.achievement,
            self.applied_slab_id,
            now,
        )?;
        match self.outcome {
            PayoutOutcome::BelowThreshold => calc.mark_below_threshold(now)?,
            _ => self.apply_adjustments(calc, now)?,
        }
        calc.record_trace(self.audit_trace.clone());
        Ok(())
    }

    fn apply_adjustments(&self, calc: &mut Calculation, now: DateTime<Utc>) -> EngineResult<()> {
        if let Some(factor) = self.prorata_factor {
            calc.apply_prorata(factor, now)?;
        }
        if let Some(cap) = &self.cap {
            calc.apply_cap(cap, now)?;
        }
        Ok(())
    }

    /// Converts the computation into the payout of a new calculation version.
    ///
    /// # Errors
    ///
    /// An ineligible result cannot open a new version.
    pub fn into_revised(self) -> EngineResult<RevisedPayout> {
        if let PayoutOutcome::Ineligible { reason } = self.outcome {
            return Err(EngineError::validation("eligibility", reason));
        }
        Ok(RevisedPayout {
            actual_value: self.actual_value,
            achievement: self.achievement,
            gross_incentive: self.gross,
            net_incentive: self.net,
            prorata_factor: self.prorata_factor,
            applied_slab_id: self.applied_slab_id,
            audit_trace: self.audit_trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AchievementType, ApprovalConfig, CalculationStatus, Currency, PayoutCaps, PlanType,
        Target,
    };
    use chrono::{NaiveDate, TimeZone};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()
    }

    fn inr(amount: &str) -> Money {
        Money::new(dec(amount), Currency::new("INR").unwrap())
    }

    fn january() -> DateRange {
        DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap()
    }

    fn sales_plan(threshold: &str, caps: PayoutCaps) -> IncentivePlan {
        let mut plan = IncentivePlan::new(
            "plan_sales",
            "Sales 2025",
            PlanType::SlabBased,
            DateRange::new(date(2025, 1, 1), date(2025, 12, 31)).unwrap(),
            Target {
                value: dec("100000"),
                minimum_threshold: Percentage::new(dec(threshold)).unwrap(),
                achievement_type: AchievementType::Revenue,
            },
            None,
            caps,
            ApprovalConfig::default(),
        )
        .unwrap();
        plan.add_slab(dec("100"), dec("150"), dec("10")).unwrap();
        plan
    }

    fn employee(from: NaiveDate) -> Employee {
        Employee {
            id: "emp_001".to_string(),
            name: "Asha".to_string(),
            base_salary: inr("50000"),
            eligible_from: from,
            eligible_until: None,
        }
    }

    fn pending(actual: &str) -> Calculation {
        Calculation::new(
            "emp_001",
            "plan_sales",
            january(),
            dec("100000"),
            dec(actual),
            Currency::new("INR").unwrap(),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_reference_example() {
        let result = compute_payout(
            &sales_plan("0", PayoutCaps::default()),
            &employee(date(2024, 1, 1)),
            &january(),
            dec("120000"),
        )
        .unwrap();

        assert_eq!(result.outcome, PayoutOutcome::Payable);
        assert_eq!(result.achievement.value(), dec("120"));
        assert_eq!(result.gross, inr("5000"));
        assert_eq!(result.net, inr("5000"));
        assert!(result.applied_slab_id.is_some());
        let rules: Vec<&str> = result.audit_trace.iter().map(|s| s.rule_id.as_str()).collect();
        assert_eq!(rules, vec!["eligibility", "achievement", "slab_payout", "payout_cap"]);
    }

    #[test]
    fn test_below_threshold_stops_before_payout() {
        let result = compute_payout(
            &sales_plan("90", PayoutCaps::default()),
            &employee(date(2024, 1, 1)),
            &january(),
            dec("85000"),
        )
        .unwrap();
        assert_eq!(result.outcome, PayoutOutcome::BelowThreshold);
        assert!(result.net.is_zero());
        assert_eq!(result.audit_trace.len(), 2);
    }

    #[test]
    fn test_no_matching_slab_is_below_threshold() {
        let result = compute_payout(
            &sales_plan("0", PayoutCaps::default()),
            &employee(date(2024, 1, 1)),
            &january(),
            dec("95000"),
        )
        .unwrap();
        assert_eq!(result.outcome, PayoutOutcome::BelowThreshold);
    }

    #[test]
    fn test_partial_eligibility_prorates_then_caps() {
        let caps = PayoutCaps {
            max_payout: Some(inr("2000")),
            ..PayoutCaps::default()
        };
        let result = compute_payout(
            &sales_plan("0", caps),
            &employee(date(2025, 1, 17)),
            &january(),
            dec("120000"),
        )
        .unwrap();
        assert_eq!(result.prorata_factor.unwrap().value(), dec("48.3871"));
        assert_eq!(result.net, inr("2000"));
    }

    #[test]
    fn test_period_outside_plan_rejected() {
        let period = DateRange::new(date(2026, 1, 1), date(2026, 1, 31)).unwrap();
        let result = compute_payout(
            &sales_plan("0", PayoutCaps::default()),
            &employee(date(2024, 1, 1)),
            &period,
            dec("120000"),
        );
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_record_on_matches_computation() {
        let caps = PayoutCaps {
            max_payout: Some(inr("2000")),
            ..PayoutCaps::default()
        };
        let result = compute_payout(
            &sales_plan("0", caps),
            &employee(date(2025, 1, 17)),
            &january(),
            dec("120000"),
        )
        .unwrap();
        let mut calc = pending("120000");
        result.record_on(&mut calc, now()).unwrap();

        assert_eq!(calc.status(), CalculationStatus::Capped);
        assert_eq!(calc.net_incentive(), &result.net);
        assert_eq!(calc.gross_incentive(), &inr("5000"));
        assert_eq!(calc.audit_trace().len(), 4);
    }

    #[test]
    fn test_record_ineligible() {
        let result = compute_payout(
            &sales_plan("0", PayoutCaps::default()),
            &employee(date(2025, 3, 1)),
            &january(),
            dec("120000"),
        )
        .unwrap();
        let mut calc = pending("120000");
        result.record_on(&mut calc, now()).unwrap();
        assert_eq!(calc.status(), CalculationStatus::Ineligible);
    }

    #[test]
    fn test_record_recalculation() {
        let plan = sales_plan("0", PayoutCaps::default());
        let staff = employee(date(2024, 1, 1));
        let mut calc = pending("120000");
        compute_payout(&plan, &staff, &january(), dec("120000"))
            .unwrap()
            .record_on(&mut calc, now())
            .unwrap();

        compute_payout(&plan, &staff, &january(), dec("140000"))
            .unwrap()
            .record_recalculation_on(&mut calc, now())
            .unwrap();

        assert_eq!(calc.status(), CalculationStatus::Calculated);
        assert_eq!(calc.version(), 2);
        assert_eq!(calc.achievement().value(), dec("140"));
        assert_eq!(calc.net_incentive(), &inr("5000"));
    }
}
