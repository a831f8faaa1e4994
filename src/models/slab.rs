//! Payout slab model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Percentage;

/// A payout tier: an inclusive achievement range and the rate paid within it.
///
/// Slabs are created through [`crate::calculation::add_slab`], which enforces
/// that ranges never overlap and keeps `order` contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slab {
    /// Unique identifier for the slab.
    pub id: Uuid,
    /// Lower achievement bound (inclusive), in percent.
    pub from_percentage: Decimal,
    /// Upper achievement bound (inclusive), in percent.
    pub to_percentage: Decimal,
    /// Payout rate as a percentage of the base amount.
    pub payout_rate: Percentage,
    /// 1-based position in ascending `from_percentage` order.
    pub order: u32,
}

impl Slab {
    /// Returns true if `achievement` falls within this slab's inclusive range.
    pub fn contains(&self, achievement: Percentage) -> bool {
        let value = achievement.value();
        value >= self.from_percentage && value <= self.to_percentage
    }

    /// Returns true if the inclusive ranges `[from, to]` and this slab intersect.
    pub fn overlaps(&self, from: Decimal, to: Decimal) -> bool {
        from <= self.to_percentage && self.from_percentage <= to
    }
}
