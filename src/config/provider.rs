//! Read-only sources of plans and employees.

use crate::error::EngineResult;
use crate::models::{Employee, IncentivePlan};

/// Supplies incentive plans by id.
pub trait PlanProvider: Send + Sync {
    /// Returns the plan, or `NotFound`.
    fn plan(&self, plan_id: &str) -> EngineResult<IncentivePlan>;
}

/// Supplies employees by id.
pub trait EmployeeProvider: Send + Sync {
    /// Returns the employee, or `NotFound`.
    fn employee(&self, employee_id: &str) -> EngineResult<Employee>;
}
