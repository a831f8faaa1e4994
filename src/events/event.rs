//! Domain events raised by calculation transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Money;

/// What happened to a calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEventKind {
    /// A gross payout was computed.
    CalculationCompleted {
        /// The computed gross incentive.
        gross_incentive: Money,
        /// The slab that priced the payout, if any.
        applied_slab_id: Option<Uuid>,
    },
    /// The calculation entered the approval chain.
    CalculationSubmittedForApproval {
        /// Who submitted it.
        submitted_by: String,
        /// The submission round.
        round: u32,
    },
    /// Every required level signed off.
    CalculationApproved {
        /// The final approver.
        approved_by: String,
        /// The approved net incentive.
        net_incentive: Money,
    },
    /// The approval chain was terminated by a rejection.
    CalculationRejected {
        /// Who rejected it.
        rejected_by: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The approved amount was handed to payroll.
    CalculationPaid {
        /// Who marked it paid.
        paid_by: String,
        /// The amount paid.
        net_incentive: Money,
    },
    /// The calculation was cancelled.
    CalculationVoided {
        /// Who voided it.
        voided_by: String,
        /// Why it was voided.
        reason: String,
    },
    /// The payout was corrected, in place or as a new version.
    CalculationAdjusted {
        /// Who made the correction.
        adjusted_by: String,
        /// Why the correction was made.
        reason: String,
        /// The net incentive before the correction.
        previous_amount: Money,
        /// The net incentive after the correction.
        new_amount: Money,
        /// The business version after the correction.
        version: u32,
        /// The calculation this version replaces, for versioned corrections.
        previous_version_id: Option<Uuid>,
    },
    /// The calculation was recomputed from a new actual value.
    CalculationRecalculated {
        /// The business version after recomputation.
        version: u32,
        /// The new net incentive.
        net_incentive: Money,
    },
}

impl DomainEventKind {
    /// A stable name for the event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CalculationCompleted { .. } => "CalculationCompleted",
            Self::CalculationSubmittedForApproval { .. } => "CalculationSubmittedForApproval",
            Self::CalculationApproved { .. } => "CalculationApproved",
            Self::CalculationRejected { .. } => "CalculationRejected",
            Self::CalculationPaid { .. } => "CalculationPaid",
            Self::CalculationVoided { .. } => "CalculationVoided",
            Self::CalculationAdjusted { .. } => "CalculationAdjusted",
            Self::CalculationRecalculated { .. } => "CalculationRecalculated",
        }
    }
}

/// An event raised by a calculation, delivered to sinks after the change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique identifier for the event.
    pub event_id: Uuid,
    /// The calculation that raised the event.
    pub calculation_id: Uuid,
    /// The employee the calculation belongs to.
    pub employee_id: String,
    /// When the transition happened.
    pub occurred_at: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: DomainEventKind,
}

impl DomainEvent {
    /// Creates a new event.
    pub fn new(
        calculation_id: Uuid,
        employee_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        kind: DomainEventKind,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            calculation_id,
            employee_id: employee_id.into(),
            occurred_at,
            kind,
        }
    }

    /// A stable name for the event type.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use rust_decimal::Decimal;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::new(
            Uuid::nil(),
            "emp_001",
            Utc::now(),
            DomainEventKind::CalculationRejected {
                rejected_by: "mgr_1".to_string(),
                reason: "numbers disputed".to_string(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "calculation_rejected");
        assert_eq!(json["reason"], "numbers disputed");
        assert_eq!(json["employee_id"], "emp_001");
    }

    #[test]
    fn test_event_name() {
        let kind = DomainEventKind::CalculationPaid {
            paid_by: "payroll".to_string(),
            net_incentive: Money::new(Decimal::from(10), Currency::new("INR").unwrap()),
        };
        assert_eq!(kind.name(), "CalculationPaid");
    }
}
