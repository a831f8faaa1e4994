//! Configuration types for the incentive engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::EngineResult;
use crate::models::{
    ApprovalConfig, DateRange, Employee, IncentivePlan, PayoutCaps, Percentage, PlanType, Target,
};
use crate::workflow::ExpiryPolicy;

/// Engine-wide settings from `engine.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Hours a pending approval may stay open before the sweep escalates it.
    pub escalation_sla_hours: i64,
    /// What happens when a pending approval expires.
    pub expiry_policy: ExpiryPolicy,
    /// How often a mutation is retried after a concurrency conflict.
    pub max_conflict_retries: u32,
    /// The actor recorded for automatic decisions.
    pub system_actor: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            escalation_sla_hours: 24,
            expiry_policy: ExpiryPolicy::AutoReject,
            max_conflict_retries: 3,
            system_actor: "system".to_string(),
        }
    }
}

/// A slab as written in a plan file.
#[derive(Debug, Clone, Deserialize)]
pub struct SlabDefinition {
    /// Lower achievement bound, inclusive.
    pub from_percentage: Decimal,
    /// Upper achievement bound, inclusive.
    pub to_percentage: Decimal,
    /// Payout rate as a percentage of base salary.
    pub payout_rate: Decimal,
}

/// Plan file structure (`plans/<id>.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDefinition {
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
    #[serde(default)]
    pub target_incentive_rate: Option<Percentage>,
    /// Payout ceilings.
    #[serde(default)]
    pub caps: PayoutCaps,
    /// Sign-off requirements.
    #[serde(default)]
    pub approval: ApprovalConfig,
    /// Payout slabs, in any order.
    #[serde(default)]
    pub slabs: Vec<SlabDefinition>,
}

impl PlanDefinition {
    /// Builds a validated plan. Slabs go through the same checks as
    /// [`IncentivePlan::add_slab`], so overlapping ranges are rejected.
    pub fn into_plan(self) -> EngineResult<IncentivePlan> {
        let mut plan = IncentivePlan::new(
            self.id,
            self.name,
            self.plan_type,
            self.effective,
            self.target,
            self.target_incentive_rate,
            self.caps,
            self.approval,
        )?;
        for slab in self.slabs {
            plan.add_slab(slab.from_percentage, slab.to_percentage, slab.payout_rate)?;
        }
        Ok(plan)
    }
}

/// Employees file structure (`employees.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeesConfig {
    /// Employees enrolled in incentive plans.
    pub employees: Vec<Employee>,
}

/// Complete engine configuration.
///
/// This struct aggregates all configuration loaded from the various
/// YAML files in a configuration directory.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine-wide settings.
    settings: EngineSettings,
    /// Plans by id.
    plans: HashMap<String, IncentivePlan>,
    /// Employees by id.
    employees: HashMap<String, Employee>,
}

impl EngineConfig {
    /// Creates a new EngineConfig from its component parts.
    pub fn new(settings: EngineSettings, plans: Vec<IncentivePlan>, employees: Vec<Employee>) -> Self {
        Self {
            settings,
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
            employees: employees.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns all plans.
    pub fn plans(&self) -> &HashMap<String, IncentivePlan> {
        &self.plans
    }

    /// Returns all employees.
    pub fn employees(&self) -> &HashMap<String, Employee> {
        &self.employees
    }
}
