//! Gross payout and payout caps.

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, IncentivePlan, Money, PayoutCaps, Percentage, PlanType};

use super::slab::{resolve_slab, slab_payout};

/// Gross payout before proration and caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrossPayout {
    /// A payout was priced.
    Payable {
        /// The gross incentive.
        gross: Money,
        /// The slab that priced it, for slab-based plans.
        applied_slab_id: Option<Uuid>,
    },
    /// Achievement fell into a gap or outside every slab.
    NoMatchingSlab,
}

/// The result of pricing a payout, including the audit step.
#[derive(Debug, Clone)]
pub struct GrossPayoutResult {
    /// The priced payout.
    pub payout: GrossPayout,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Prices the gross payout for an achievement under `plan`.
///
/// Slab-based plans pay `base × slab rate%` for the slab containing the
/// achievement. Target-based plans pay
/// `base × target_incentive_rate% × min(achievement, max_achievement) / 100`.
///
/// # Example
///
/// ```
/// use incentive_engine::calculation::{calculate_gross_payout, GrossPayout};
/// use incentive_engine::models::*;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let mut plan = IncentivePlan::new(
///     "plan_sales", "Sales 2025", PlanType::SlabBased,
///     DateRange::new(
///         NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
///         NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
///     ).unwrap(),
///     Target {
///         value: Decimal::from(100000),
///         minimum_threshold: Percentage::ZERO,
///         achievement_type: AchievementType::Revenue,
///     },
///     None, PayoutCaps::default(), ApprovalConfig::default(),
/// ).unwrap();
/// plan.add_slab(Decimal::from(100), Decimal::from(150), Decimal::from(10)).unwrap();
///
/// let base = Money::new(Decimal::from(50000), Currency::new("INR").unwrap());
/// let achievement = Percentage::new(Decimal::from(120)).unwrap();
/// let result = calculate_gross_payout(&plan, &base, achievement, 1).unwrap();
///
/// match result.payout {
///     GrossPayout::Payable { gross, .. } => assert_eq!(gross.amount, Decimal::from(5000)),
///     GrossPayout::NoMatchingSlab => panic!("expected a payout"),
/// }
/// ```
pub fn calculate_gross_payout(
    plan: &IncentivePlan,
    base: &Money,
    achievement: Percentage,
    step_number: u32,
) -> EngineResult<GrossPayoutResult> {
    match plan.plan_type {
        PlanType::SlabBased => {
            let input = serde_json::json!({
                "plan_type": "slab_based",
                "base_salary": base.to_string(),
                "achievement": achievement.value().to_string(),
                "slab_count": plan.slabs().len(),
            });
            let result = match resolve_slab(plan.slabs(), achievement) {
                Some(slab) => {
                    let gross = slab_payout(slab, base)?;
                    GrossPayoutResult {
                        audit_step: AuditStep {
                            step_number,
                            rule_id: "slab_payout".to_string(),
                            rule_name: "Slab Payout".to_string(),
                            input,
                            output: serde_json::json!({
                                "slab_id": slab.id,
                                "slab_order": slab.order,
                                "payout_rate": slab.payout_rate.value().to_string(),
                                "gross_incentive": gross.to_string(),
                            }),
                            reasoning: format!(
                                "Achievement {} falls in slab {} [{}, {}]; {} of {} is {}",
                                achievement,
                                slab.order,
                                slab.from_percentage,
                                slab.to_percentage,
                                slab.payout_rate,
                                base,
                                gross
                            ),
                        },
                        payout: GrossPayout::Payable {
                            gross,
                            applied_slab_id: Some(slab.id),
                        },
                    }
                }
                None => GrossPayoutResult {
                    payout: GrossPayout::NoMatchingSlab,
                    audit_step: AuditStep {
                        step_number,
                        rule_id: "slab_payout".to_string(),
                        rule_name: "Slab Payout".to_string(),
                        input,
                        output: serde_json::json!({"slab_id": null}),
                        reasoning: format!("Achievement {} matches no slab", achievement),
                    },
                },
            };
            Ok(result)
        }
        PlanType::TargetBased => {
            let rate = plan.target_incentive_rate.ok_or_else(|| {
                EngineError::validation(
                    "target_incentive_rate",
                    format!("plan {} has no target incentive rate", plan.id),
                )
            })?;
            let rewarded = match plan.caps.max_achievement {
                Some(max) => achievement.min(max),
                None => achievement,
            };
            let gross = base.percent_of(rate)?.percent_of(rewarded)?;

            Ok(GrossPayoutResult {
                payout: GrossPayout::Payable {
                    gross: gross.clone(),
                    applied_slab_id: None,
                },
                audit_step: AuditStep {
                    step_number,
                    rule_id: "target_payout".to_string(),
                    rule_name: "Target Payout".to_string(),
                    input: serde_json::json!({
                        "plan_type": "target_based",
                        "base_salary": base.to_string(),
                        "achievement": achievement.value().to_string(),
                        "target_incentive_rate": rate.value().to_string(),
                        "max_achievement": plan.caps.max_achievement.map(|p| p.value().to_string()),
                    }),
                    output: serde_json::json!({
                        "rewarded_achievement": rewarded.value().to_string(),
                        "gross_incentive": gross.to_string(),
                    }),
                    reasoning: format!(
                        "{} target incentive on {} at {} rewarded achievement is {}",
                        rate, base, rewarded, gross
                    ),
                },
            })
        }
    }
}

/// The result of resolving a plan's payout ceiling.
#[derive(Debug, Clone)]
pub struct PayoutCapResult {
    /// The effective ceiling, if the plan has one.
    pub cap: Option<Money>,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Resolves the effective payout ceiling:
/// `min(max_payout, base × max_salary_percentage)`.
///
/// # Errors
///
/// Returns [`EngineError::CurrencyMismatch`] if `max_payout` is not in the
/// base salary's currency.
pub fn effective_cap(
    caps: &PayoutCaps,
    base: &Money,
    step_number: u32,
) -> EngineResult<PayoutCapResult> {
    let salary_cap = caps
        .max_salary_percentage
        .map(|p| base.percent_of(p))
        .transpose()?;
    let cap = match (caps.max_payout.clone(), salary_cap.clone()) {
        (Some(absolute), Some(relative)) => Some(absolute.min(relative)?),
        (Some(absolute), None) => {
            absolute.try_cmp(base)?;
            Some(absolute)
        }
        (None, relative) => relative,
    };

    let reasoning = match &cap {
        Some(cap) => format!("Net incentive is capped at {}", cap),
        None => "Plan has no payout cap".to_string(),
    };

    Ok(PayoutCapResult {
        audit_step: AuditStep {
            step_number,
            rule_id: "payout_cap".to_string(),
            rule_name: "Payout Cap".to_string(),
            input: serde_json::json!({
                "max_payout": caps.max_payout.as_ref().map(|m| m.to_string()),
                "max_salary_percentage": caps.max_salary_percentage.map(|p| p.value().to_string()),
                "base_salary": base.to_string(),
            }),
            output: serde_json::json!({
                "salary_cap": salary_cap.map(|m| m.to_string()),
                "effective_cap": cap.as_ref().map(|m| m.to_string()),
            }),
            reasoning,
        },
        cap,
    })
}
