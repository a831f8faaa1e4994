//! Batch runs with per-item outcomes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{Calculation, DateRange};

use super::IncentiveService;

/// Input for one calculation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRequest {
    /// The employee to calculate for.
    pub employee_id: String,
    /// The plan to calculate under.
    pub plan_id: String,
    /// The incentive period.
    pub period: DateRange,
    /// The actual value achieved in the period.
    pub actual_value: Decimal,
}

/// The result of one item of a batch. A failed item never aborts the batch.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Identifies the item (employee, approval or calculation id).
    pub item: String,
    /// What happened to it.
    pub result: EngineResult<T>,
}

impl<T> BatchOutcome<T> {
    /// Returns true if the item succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub(super) fn log_batch<T>(operation: &str, outcomes: &[BatchOutcome<T>]) {
    for outcome in outcomes {
        if let Err(e) = &outcome.result {
            warn!(operation = operation, item = %outcome.item, error = %e, "Batch item failed");
        }
    }
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    info!(
        operation = operation,
        total = outcomes.len(),
        succeeded = succeeded,
        failed = outcomes.len() - succeeded,
        "Batch finished"
    );
}

impl IncentiveService {
    /// Runs every request in order; each item succeeds or fails on its own.
    pub fn run_batch(&self, requests: &[CalculationRequest]) -> Vec<BatchOutcome<Calculation>> {
        let outcomes: Vec<_> = requests
            .iter()
            .map(|request| BatchOutcome {
                item: format!(
                    "{}/{}/{}",
                    request.employee_id,
                    request.plan_id,
                    request.period.label()
                ),
                result: self.run_calculation(request),
            })
            .collect();
        log_batch("run_batch", &outcomes);
        outcomes
    }

    /// Approves each approval as `actor`; each item succeeds or fails on its own.
    pub fn bulk_approve(
        &self,
        approval_ids: &[Uuid],
        actor: &str,
        comments: Option<&str>,
    ) -> Vec<BatchOutcome<Calculation>> {
        let outcomes: Vec<_> = approval_ids
            .iter()
            .map(|&approval_id| BatchOutcome {
                item: approval_id.to_string(),
                result: self.approve(approval_id, actor, comments),
            })
            .collect();
        log_batch("bulk_approve", &outcomes);
        outcomes
    }
}
