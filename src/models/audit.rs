//! Audit trace of the rules applied during a payout computation.

use serde::{Deserialize, Serialize};

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
///
/// # Example
///
/// ```
/// use incentive_engine::models::AuditStep;
///
/// let step = AuditStep {
///     step_number: 1,
///     rule_id: "achievement".to_string(),
///     rule_name: "Achievement Percentage".to_string(),
///     input: serde_json::json!({"actual": "120000", "target": "100000"}),
///     output: serde_json::json!({"achievement": "120"}),
///     reasoning: "120000 against a target of 100000 is 120% achievement".to_string(),
/// };
/// assert_eq!(step.rule_id, "achievement");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}
