//! Achievement percentage and threshold check.

use rust_decimal::Decimal;

use crate::error::EngineResult;
use crate::models::{AuditStep, Percentage, Target};

/// The result of measuring an actual value against a target.
#[derive(Debug, Clone)]
pub struct AchievementResult {
    /// `actual / target × 100`, rounded to two places.
    pub achievement: Percentage,
    /// Whether the plan's minimum threshold was reached.
    pub meets_threshold: bool,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Measures `actual` against the plan target.
///
/// # Errors
///
/// Returns a validation error if the target is not positive or `actual` is
/// negative.
///
/// # Example
///
/// ```
/// use incentive_engine::calculation::calculate_achievement;
/// use incentive_engine::models::{AchievementType, Percentage, Target};
/// use rust_decimal::Decimal;
///
/// let target = Target {
///     value: Decimal::from(100000),
///     minimum_threshold: Percentage::new(Decimal::from(80)).unwrap(),
///     achievement_type: AchievementType::Revenue,
/// };
///
/// let result = calculate_achievement(Decimal::from(120000), &target, 1).unwrap();
/// assert_eq!(result.achievement.value(), Decimal::from(120));
/// assert!(result.meets_threshold);
/// ```
pub fn calculate_achievement(
    actual: Decimal,
    target: &Target,
    step_number: u32,
) -> EngineResult<AchievementResult> {
    let achievement = Percentage::achievement(actual, target.value)?;
    let meets_threshold = achievement >= target.minimum_threshold;

    let reasoning = if meets_threshold {
        format!(
            "{} against a target of {} is {} achievement, at or above the {} threshold",
            actual, target.value, achievement, target.minimum_threshold
        )
    } else {
        format!(
            "{} against a target of {} is {} achievement, below the {} threshold",
            actual, target.value, achievement, target.minimum_threshold
        )
    };

    Ok(AchievementResult {
        achievement,
        meets_threshold,
        audit_step: AuditStep {
            step_number,
            rule_id: "achievement".to_string(),
            rule_name: "Achievement Percentage".to_string(),
            input: serde_json::json!({
                "actual": actual.to_string(),
                "target": target.value.to_string(),
                "achievement_type": target.achievement_type,
                "minimum_threshold": target.minimum_threshold.value().to_string(),
            }),
            output: serde_json::json!({
                "achievement": achievement.value().to_string(),
                "meets_threshold": meets_threshold,
            }),
            reasoning,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::AchievementType;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn target(value: &str, threshold: &str) -> Target {
        Target {
            value: dec(value),
            minimum_threshold: Percentage::new(dec(threshold)).unwrap(),
            achievement_type: AchievementType::Units,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let result = calculate_achievement(dec("80"), &target("100", "80"), 2).unwrap();
        assert!(result.meets_threshold);
        assert_eq!(result.audit_step.step_number, 2);
    }

    #[test]
    fn test_below_threshold() {
        let result = calculate_achievement(dec("79.99"), &target("100", "80"), 1).unwrap();
        assert!(!result.meets_threshold);
        assert_eq!(result.achievement.value(), dec("79.99"));
    }

    #[test]
    fn test_zero_target_is_validation_error() {
        let result = calculate_achievement(dec("10"), &target("0", "0"), 1);
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_negative_actual_is_validation_error() {
        let result = calculate_achievement(dec("-1"), &target("100", "0"), 1);
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }
}
