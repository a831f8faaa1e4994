//! Multi-level approval workflow.
//!
//! [`ApprovalChain`] drives a calculation's approvals level by level,
//! [`ExpiryPolicy`] decides what an expired approval turns into, and the
//! [`sweep`] selectors find approvals that need time-driven action.

mod chain;
mod policy;
pub mod sweep;

pub use chain::{ApprovalChain, ChainState, ExpiryOutcome};
pub use policy::ExpiryPolicy;
