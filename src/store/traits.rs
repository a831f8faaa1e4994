//! Persistence seam for calculations.

use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{Calculation, CalculationStatus, DateRange};

/// Criteria for [`CalculationStore::find`]. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationFilter {
    /// Only calculations for this employee.
    pub employee_id: Option<String>,
    /// Only calculations under this plan.
    pub plan_id: Option<String>,
    /// Only calculations in this status.
    pub status: Option<CalculationStatus>,
    /// Only calculations for exactly this period.
    pub period: Option<DateRange>,
    /// Only calculations with a pending approval assigned to this approver.
    pub pending_approver_id: Option<String>,
    /// Include superseded versions and voided calculations.
    pub include_inactive: bool,
}

impl CalculationFilter {
    /// Returns true if `calc` satisfies every criterion.
    pub fn matches(&self, calc: &Calculation) -> bool {
        if !self.include_inactive && !calc.is_head() {
            return false;
        }
        if self.employee_id.as_deref().is_some_and(|id| id != calc.employee_id()) {
            return false;
        }
        if self.plan_id.as_deref().is_some_and(|id| id != calc.plan_id()) {
            return false;
        }
        if self.status.is_some_and(|status| status != calc.status()) {
            return false;
        }
        if self.period.is_some_and(|period| period != calc.period()) {
            return false;
        }
        if let Some(approver) = self.pending_approver_id.as_deref() {
            return calc
                .approvals()
                .iter()
                .any(|a| a.is_pending() && a.approver_id() == approver);
        }
        true
    }
}

/// Durable storage for calculations and the approvals they own.
///
/// ## Revisions
///
/// Every stored calculation carries a revision. `update` is conditional on
/// the stored revision equalling `calc.revision()`; on mismatch it returns
/// [`crate::error::EngineError::ConcurrencyConflict`] and stores nothing.
/// Successful writes return the new revision, which the caller copies back
/// onto its aggregate.
///
/// ## Invariants re-checked on every write
///
/// - one active chain head per employee, plan and period
/// - at most one pending approval per level
pub trait CalculationStore: Send + Sync {
    /// Stores a new calculation.
    ///
    /// Returns [`crate::error::EngineError::DuplicateCalculation`] if an
    /// active head already exists for the same employee, plan and period.
    fn insert(&self, calc: &Calculation) -> EngineResult<u64>;

    /// Reads a calculation.
    fn get(&self, id: Uuid) -> EngineResult<Calculation>;

    /// Writes a revision-checked update.
    fn update(&self, calc: &Calculation) -> EngineResult<u64>;

    /// Atomically updates `prior` (revision-checked) and inserts its
    /// successor version. Returns the new revisions of both.
    fn supersede(&self, prior: &Calculation, successor: &Calculation) -> EngineResult<(u64, u64)>;

    /// Reads the calculation owning an approval.
    fn find_by_approval(&self, approval_id: Uuid) -> EngineResult<Calculation>;

    /// Lists calculations matching `filter`, oldest first.
    fn find(&self, filter: &CalculationFilter) -> EngineResult<Vec<Calculation>>;
}
