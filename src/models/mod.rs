//! Core data models for the incentive engine.
//!
//! This module contains the value objects, plan configuration, the
//! calculation aggregate and the approval records it owns.

mod approval;
mod audit;
mod calculation;
mod date_range;
mod employee;
mod money;
mod percentage;
mod plan;
mod slab;

pub use approval::{Approval, ApprovalStatus};
pub(crate) use approval::required_reason;
pub use audit::AuditStep;
pub use calculation::{Calculation, CalculationStatus, RevisedPayout};
pub use date_range::DateRange;
pub use employee::Employee;
pub use money::{Currency, Money};
pub use percentage::{ACHIEVEMENT_SCALE, Percentage};
pub use plan::{
    AchievementType, ApprovalConfig, IncentivePlan, LevelApprover, PayoutCaps, PlanType, Target,
};
pub use slab::Slab;
