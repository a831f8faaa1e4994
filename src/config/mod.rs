//! Configuration loading and management for the incentive engine.
//!
//! This module loads engine settings, employees and incentive plans from
//! YAML files, and defines the provider traits the service reads plans and
//! employees through.
//!
//! # Example
//!
//! ```no_run
//! use incentive_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/sample").unwrap();
//! println!("Expiry policy: {}", config.settings().expiry_policy);
//! ```

mod loader;
mod provider;
mod types;

pub use loader::ConfigLoader;
pub use provider::{EmployeeProvider, PlanProvider};
pub use types::{EmployeesConfig, EngineConfig, EngineSettings, PlanDefinition, SlabDefinition};
