//! Calculation logic for the incentive engine.
//!
//! This module contains the pure payout rules: slab resolution and slab-set
//! maintenance, achievement against target, eligibility and proration, gross
//! payout pricing, payout caps, and the pipeline that runs them in order and
//! records the result on a calculation.

mod achievement;
mod payout;
mod pipeline;
mod proration;
mod slab;

pub use achievement::{AchievementResult, calculate_achievement};
pub use payout::{
    GrossPayout, GrossPayoutResult, PayoutCapResult, calculate_gross_payout, effective_cap,
};
pub use pipeline::{PayoutComputation, PayoutOutcome, compute_payout};
pub use proration::{
    Eligibility, EligibilityResult, PRORATION_SCALE, determine_eligibility, proration_factor,
};
pub use slab::{add_slab, remove_slab, resolve_slab, slab_payout};
