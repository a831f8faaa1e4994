//! Request types for the Incentive Engine API.
//!
//! Calculation runs reuse [`crate::service::CalculationRequest`]; the types
//! here carry the actor and arguments of the workflow endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::CalculationStatus;
use crate::service::CalculationRequest;
use crate::store::CalculationFilter;

/// Request body for `POST /calculations/batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// The runs to perform, in order.
    pub requests: Vec<CalculationRequest>,
}

/// Query string for `GET /calculations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindQuery {
    /// Only calculations for this employee.
    pub employee_id: Option<String>,
    /// Only calculations under this plan.
    pub plan_id: Option<String>,
    /// Only calculations in this status.
    pub status: Option<CalculationStatus>,
    /// Only calculations waiting on this approver.
    pub pending_approver_id: Option<String>,
    /// Include superseded and voided calculations.
    #[serde(default)]
    pub include_inactive: bool,
}

impl From<FindQuery> for CalculationFilter {
    fn from(query: FindQuery) -> Self {
        CalculationFilter {
            employee_id: query.employee_id,
            plan_id: query.plan_id,
            status: query.status,
            period: None,
            pending_approver_id: query.pending_approver_id,
            include_inactive: query.include_inactive,
        }
    }
}

/// Request body for `POST /calculations/:id/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Who submits the calculation.
    pub submitted_by: String,
}

/// Request body for `POST /calculations/:id/adjust`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustRequest {
    /// The corrected net incentive, in the calculation's currency.
    pub new_amount: Decimal,
    /// Why the payout is corrected.
    pub reason: String,
    /// Who makes the correction.
    pub adjusted_by: String,
}

/// Request body for `POST /calculations/:id/adjustments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdjustmentRequest {
    /// The corrected actual value.
    pub actual_value: Decimal,
    /// Why a new version is opened.
    pub reason: String,
    /// Who makes the correction.
    pub adjusted_by: String,
}

/// Request body for `POST /calculations/:id/recalculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculateRequest {
    /// The new actual value.
    pub actual_value: Decimal,
}

/// Request body for `POST /calculations/:id/void`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidRequest {
    /// Why the calculation is cancelled.
    pub reason: String,
    /// Who cancels it.
    pub voided_by: String,
}

/// Request body for `POST /calculations/:id/pay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayRequest {
    /// Who hands the payout to payroll.
    pub paid_by: String,
}

/// Request body for `POST /approvals/:id/approve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    /// The approver acting on the approval.
    pub approver_id: String,
    /// Optional remarks.
    #[serde(default)]
    pub comments: Option<String>,
}

/// Request body for `POST /approvals/:id/reject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    /// The approver acting on the approval.
    pub approver_id: String,
    /// Why the calculation is rejected.
    pub reason: String,
}

/// Request body for `POST /approvals/:id/delegate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateRequest {
    /// The approver handing the decision on.
    pub approver_id: String,
    /// Who takes the decision over.
    pub delegate_to: String,
}

/// Request body for `POST /approvals/:id/escalate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalateRequest {
    /// Who escalates.
    pub escalated_by: String,
    /// Why the decision moves up.
    pub reason: String,
}

/// Request body for `POST /approvals/bulk-approve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkApproveRequest {
    /// The approvals to approve.
    pub approval_ids: Vec<Uuid>,
    /// The approver acting on all of them.
    pub approver_id: String,
    /// Optional remarks recorded on each.
    #[serde(default)]
    pub comments: Option<String>,
}
