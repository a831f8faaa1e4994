//! Sales Incentive Engine
//!
//! This crate computes sales incentives from targets, actuals and payout
//! slabs, and drives each calculation through a multi-level approval chain
//! with delegation, escalation, versioned corrections and an auditable
//! event trail.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod service;
pub mod store;
pub mod workflow;
