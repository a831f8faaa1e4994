//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading plans,
//! employees and engine settings from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::models::{Employee, IncentivePlan};

use super::provider::{EmployeeProvider, PlanProvider};
use super::types::{EmployeesConfig, EngineConfig, EngineSettings, PlanDefinition};

/// Loads and provides access to engine configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory and
/// serves as the reference [`PlanProvider`] and [`EmployeeProvider`].
///
/// # Directory Structure
///
/// ```text
/// config/sample/
/// ├── engine.yaml      # Engine settings (optional; defaults apply)
/// ├── employees.yaml   # Employees and base salaries
/// └── plans/
///     └── sales_2025.yaml
/// ```
///
/// # Example
///
/// ```no_run
/// use incentive_engine::config::{ConfigLoader, PlanProvider};
///
/// let loader = ConfigLoader::load("./config/sample")?;
/// let plan = loader.plan("plan_sales_2025")?;
/// println!("Loaded plan: {}", plan.name);
/// # Ok::<(), incentive_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - `employees.yaml` or the `plans` directory is missing
    /// - Any file contains invalid YAML
    /// - Any plan fails validation (non-positive target, overlapping slabs,
    ///   approval levels without approvers)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let engine_path = path.join("engine.yaml");
        let settings = if engine_path.exists() {
            Self::load_yaml::<EngineSettings>(&engine_path)?
        } else {
            EngineSettings::default()
        };

        let employees_path = path.join("employees.yaml");
        let employees = Self::load_yaml::<EmployeesConfig>(&employees_path)?.employees;

        let plans = Self::load_plans(&path.join("plans"))?;

        Self::from_parts(settings, plans, employees)
    }

    /// Builds a loader from already-constructed parts.
    ///
    /// # Errors
    ///
    /// Returns a validation error if two plans or two employees share an id.
    pub fn from_parts(
        settings: EngineSettings,
        plans: Vec<IncentivePlan>,
        employees: Vec<Employee>,
    ) -> EngineResult<Self> {
        let mut plan_ids = std::collections::HashSet::new();
        for plan in &plans {
            if !plan_ids.insert(plan.id.as_str()) {
                return Err(EngineError::validation("plans", format!("duplicate plan id {}", plan.id)));
            }
        }
        let mut employee_ids = std::collections::HashSet::new();
        for employee in &employees {
            if !employee_ids.insert(employee.id.as_str()) {
                return Err(EngineError::validation(
                    "employees",
                    format!("duplicate employee id {}", employee.id),
                ));
            }
        }
        Ok(Self {
            config: EngineConfig::new(settings, plans, employees),
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads and validates all plan files from the plans directory.
    fn load_plans(plans_dir: &Path) -> EngineResult<Vec<IncentivePlan>> {
        let plans_dir_str = plans_dir.display().to_string();

        if !plans_dir.exists() {
            return Err(EngineError::ConfigNotFound {
                path: plans_dir_str,
            });
        }

        let entries = fs::read_dir(plans_dir).map_err(|_| EngineError::ConfigNotFound {
            path: plans_dir_str.clone(),
        })?;

        let mut plans = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: plans_dir_str.clone(),
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                let definition = Self::load_yaml::<PlanDefinition>(&path)?;
                let plan = definition.into_plan().map_err(|e| EngineError::ConfigParseError {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                plans.push(plan);
            }
        }

        if plans.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no plan files found)", plans_dir_str),
            });
        }

        Ok(plans)
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        self.config.settings()
    }
}

impl PlanProvider for ConfigLoader {
    fn plan(&self, plan_id: &str) -> EngineResult<IncentivePlan> {
        self.config
            .plans()
            .get(plan_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("plan", plan_id))
    }
}

impl EmployeeProvider for ConfigLoader {
    fn employee(&self, employee_id: &str) -> EngineResult<Employee> {
        self.config
            .employees()
            .get(employee_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("employee", employee_id))
    }
}
