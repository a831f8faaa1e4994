//! Incentive plan model.
//!
//! A plan is read-only configuration during a computation. It fixes the
//! target, the payout tiers (for slab-based plans), the payout caps and the
//! sign-off chain a computed incentive has to pass before it can be paid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calculation::{add_slab, remove_slab};
use crate::error::{EngineError, EngineResult};

use super::{DateRange, Money, Percentage, Slab};

/// How the payout is derived from achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// Payout grows linearly with achievement against a target incentive rate.
    TargetBased,
    /// Payout rate is looked up from achievement slabs.
    SlabBased,
}

/// What the target measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    /// Sales revenue booked in the period.
    Revenue,
    /// Units sold in the period.
    Units,
    /// Gross margin booked in the period.
    Margin,
}

/// The target an employee's actual value is measured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// The target value; must be greater than zero.
    pub value: Decimal,
    /// Achievement below this percentage earns nothing.
    pub minimum_threshold: Percentage,
    /// What the target measures.
    pub achievement_type: AchievementType,
}

/// Upper bounds applied to a computed payout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCaps {
    /// Absolute ceiling on the net payout.
    #[serde(default)]
    pub max_payout: Option<Money>,
    /// Ceiling expressed as a percentage of base salary.
    #[serde(default)]
    pub max_salary_percentage: Option<Percentage>,
    /// Achievement above this value is not rewarded (target-based plans).
    #[serde(default)]
    pub max_achievement: Option<Percentage>,
}

/// The approver assigned to one level of the sign-off chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelApprover {
    /// The approval level (1-based).
    pub level: u32,
    /// The approver responsible for the level.
    pub approver_id: String,
}

/// Sign-off requirements for calculations under a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Whether calculations must be approved before payment.
    #[serde(default)]
    pub requires_approval: bool,
    /// Number of sequential approval levels.
    #[serde(default)]
    pub approval_levels: u32,
    /// The approver for each level.
    #[serde(default)]
    pub approvers: Vec<LevelApprover>,
    /// Who takes over when the last level is escalated.
    #[serde(default)]
    pub escalation_approver_id: Option<String>,
    /// Hours a pending approval stays open before it expires.
    #[serde(default)]
    pub expiry_hours: Option<i64>,
}

impl ApprovalConfig {
    /// Number of levels a calculation has to pass; zero when approval is not required.
    pub fn required_levels(&self) -> u32 {
        if self.requires_approval {
            self.approval_levels
        } else {
            0
        }
    }

    /// Returns the approver configured for `level`.
    pub fn approver_for(&self, level: u32) -> Option<&str> {
        self.approvers
            .iter()
            .find(|a| a.level == level)
            .map(|a| a.approver_id.as_str())
    }

    /// Checks that every required level has exactly one approver.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.requires_approval {
            return Ok(());
        }
        if self.approval_levels == 0 {
            return Err(EngineError::validation(
                "approval_levels",
                "must be at least 1 when approval is required",
            ));
        }
        for level in 1..=self.approval_levels {
            let count = self.approvers.iter().filter(|a| a.level == level).count();
            if count != 1 {
                return Err(EngineError::validation(
                    "approvers",
                    format!("level {} needs exactly one approver, found {}", level, count),
                ));
            }
        }
        if let Some(hours) = self.expiry_hours {
            if hours <= 0 {
                return Err(EngineError::validation(
                    "expiry_hours",
                    format!("must be positive, got {}", hours),
                ));
            }
        }
        Ok(())
    }
}

/// A configured incentive plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncentivePlan {
    /// Unique identifier for the plan.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// How payouts are derived.
    pub plan_type: PlanType,
    /// The dates the plan applies to.
    pub effective: DateRange,
    /// The target employees are measured against.
    pub target: Target,
    /// Payout rate at 100% achievement for target-based plans.
    pub target_incentive_rate: Option<Percentage>,
    /// Payout ceilings.
    pub caps: PayoutCaps,
    /// Sign-off requirements.
    pub approval: ApprovalConfig,
    slabs: Vec<Slab>,
}

impl IncentivePlan {
    /// Creates a plan without slabs, validating target, payout rate and approval chain.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        plan_type: PlanType,
        effective: DateRange,
        target: Target,
        target_incentive_rate: Option<Percentage>,
        caps: PayoutCaps,
        approval: ApprovalConfig,
    ) -> EngineResult<Self> {
        effective.validate()?;
        if target.value <= Decimal::ZERO {
            return Err(EngineError::validation(
                "target.value",
                format!("must be greater than zero, got {}", target.value),
            ));
        }
        if plan_type == PlanType::TargetBased && target_incentive_rate.is_none() {
            return Err(EngineError::validation(
                "target_incentive_rate",
                "required for target-based plans",
            ));
        }
        approval.validate()?;

        Ok(Self {
            id: id.into(),
            name: name.into(),
            plan_type,
            effective,
            target,
            target_incentive_rate,
            caps,
            approval,
            slabs: Vec::new(),
        })
    }

    /// The plan's slabs, sorted by `order`.
    pub fn slabs(&self) -> &[Slab] {
        &self.slabs
    }

    /// Adds a payout slab; see [`crate::calculation::add_slab`].
    pub fn add_slab(&mut self, from: Decimal, to: Decimal, rate: Decimal) -> EngineResult<Slab> {
        add_slab(&mut self.slabs, from, to, rate)
    }

    /// Removes a payout slab; see [`crate::calculation::remove_slab`].
    pub fn remove_slab(&mut self, slab_id: Uuid) -> EngineResult<Slab> {
        remove_slab(&mut self.slabs, slab_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn year_2025() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        )
        .unwrap()
    }

    fn target(value: &str) -> Target {
        Target {
            value: dec(value),
            minimum_threshold: Percentage::new(dec("50")).unwrap(),
            achievement_type: AchievementType::Revenue,
        }
    }

    fn approval(levels: u32) -> ApprovalConfig {
        ApprovalConfig {
            requires_approval: true,
            approval_levels: levels,
            approvers: (1..=levels)
                .map(|level| LevelApprover {
                    level,
                    approver_id: format!("mgr_{}", level),
                })
                .collect(),
            escalation_approver_id: None,
            expiry_hours: Some(48),
        }
    }

    fn slab_plan(target_value: &str, approval: ApprovalConfig) -> EngineResult<IncentivePlan> {
        IncentivePlan::new(
            "plan_001",
            "Sales 2025",
            PlanType::SlabBased,
            year_2025(),
            target(target_value),
            None,
            PayoutCaps::default(),
            approval,
        )
    }

    #[test]
    fn test_zero_target_rejected_at_plan_creation() {
        let result = slab_plan("0", approval(1));
        match result {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "target.value"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_target_based_plan_requires_rate() {
        let result = IncentivePlan::new(
            "plan_002",
            "Target 2025",
            PlanType::TargetBased,
            year_2025(),
            target("100000"),
            None,
            PayoutCaps::default(),
            ApprovalConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_level_approver_rejected() {
        let mut config = approval(3);
        config.approvers.retain(|a| a.level != 2);
        assert!(slab_plan("100000", config).is_err());
    }

    #[test]
    fn test_duplicate_level_approver_rejected() {
        let mut config = approval(1);
        config.approvers.push(LevelApprover {
            level: 1,
            approver_id: "mgr_other".to_string(),
        });
        assert!(slab_plan("100000", config).is_err());
    }

    #[test]
    fn test_required_levels_zero_when_not_required() {
        let config = ApprovalConfig {
            requires_approval: false,
            approval_levels: 3,
            ..ApprovalConfig::default()
        };
        assert_eq!(config.required_levels(), 0);
        assert_eq!(approval(3).required_levels(), 3);
    }

    #[test]
    fn test_plan_slab_maintenance() {
        let mut plan = slab_plan("100000", approval(1)).unwrap();
        let slab = plan.add_slab(dec("100"), dec("150"), dec("10")).unwrap();
        assert!(plan.add_slab(dec("120"), dec("130"), dec("12")).is_err());
        assert_eq!(plan.slabs().len(), 1);
        plan.remove_slab(slab.id).unwrap();
        assert!(plan.slabs().is_empty());
    }
}
