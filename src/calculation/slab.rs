//! Slab resolution and slab-set maintenance.
//!
//! A plan's slabs form an ordered set of non-overlapping, inclusive
//! achievement ranges. The functions here are the only way slabs are added or
//! removed, so the set stays sorted by `from_percentage` with contiguous
//! `order` values starting at 1.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Money, Percentage, Slab};

/// Returns the first slab (in ascending order) whose inclusive range contains
/// `achievement`, or `None` if the achievement falls in a gap or outside all
/// slabs.
///
/// # Example
///
/// ```
/// use incentive_engine::calculation::{add_slab, resolve_slab};
/// use incentive_engine::models::Percentage;
/// use rust_decimal::Decimal;
///
/// let mut slabs = Vec::new();
/// add_slab(&mut slabs, Decimal::from(50), Decimal::from(99), Decimal::from(5)).unwrap();
/// add_slab(&mut slabs, Decimal::from(100), Decimal::from(150), Decimal::from(10)).unwrap();
///
/// let achievement = Percentage::new(Decimal::from(120)).unwrap();
/// let slab = resolve_slab(&slabs, achievement).unwrap();
/// assert_eq!(slab.payout_rate.value(), Decimal::from(10));
///
/// let gap = Percentage::new(Decimal::new(9950, 2)).unwrap();
/// assert!(resolve_slab(&slabs, gap).is_none());
/// ```
pub fn resolve_slab(slabs: &[Slab], achievement: Percentage) -> Option<&Slab> {
    let mut ordered: Vec<&Slab> = slabs.iter().collect();
    ordered.sort_by_key(|slab| slab.order);
    ordered.into_iter().find(|slab| slab.contains(achievement))
}

/// Adds a slab to the set after validating it.
///
/// Rejects an inverted or negative range, a negative payout rate, and any
/// range that intersects an existing slab (bounds are inclusive, so touching
/// ranges such as `[0, 100]` and `[100, 150]` overlap).
///
/// The new slab receives `order = count + 1`; the set is then re-sorted by
/// `from_percentage` and renumbered so `order` always follows the ranges.
pub fn add_slab(
    slabs: &mut Vec<Slab>,
    from: Decimal,
    to: Decimal,
    rate: Decimal,
) -> EngineResult<Slab> {
    if from.is_sign_negative() && !from.is_zero() {
        return Err(EngineError::validation(
            "from_percentage",
            format!("{} must not be negative", from),
        ));
    }
    if from > to {
        return Err(EngineError::validation(
            "from_percentage",
            format!("{} is greater than to_percentage {}", from, to),
        ));
    }
    let payout_rate = Percentage::new(rate).map_err(|_| {
        EngineError::validation("payout_rate", format!("{} must not be negative", rate))
    })?;

    if let Some(existing) = slabs.iter().find(|slab| slab.overlaps(from, to)) {
        return Err(EngineError::validation(
            "slab",
            format!(
                "range [{}, {}] overlaps existing slab [{}, {}]",
                from, to, existing.from_percentage, existing.to_percentage
            ),
        ));
    }

    let slab = Slab {
        id: Uuid::new_v4(),
        from_percentage: from,
        to_percentage: to,
        payout_rate,
        order: slabs.len() as u32 + 1,
    };
    let id = slab.id;
    slabs.push(slab);
    renumber(slabs);

    slabs
        .iter()
        .find(|slab| slab.id == id)
        .cloned()
        .ok_or_else(|| EngineError::not_found("slab", id))
}

/// Removes a slab and renumbers the remaining ones by ascending `from_percentage`.
pub fn remove_slab(slabs: &mut Vec<Slab>, slab_id: Uuid) -> EngineResult<Slab> {
    let index = slabs
        .iter()
        .position(|slab| slab.id == slab_id)
        .ok_or_else(|| EngineError::not_found("slab", slab_id))?;
    let removed = slabs.remove(index);
    renumber(slabs);
    Ok(removed)
}

/// Computes the payout for a slab: `base × rate%`.
pub fn slab_payout(slab: &Slab, base: &Money) -> EngineResult<Money> {
    base.percent_of(slab.payout_rate)
}

fn renumber(slabs: &mut [Slab]) {
    slabs.sort_by(|a, b| a.from_percentage.cmp(&b.from_percentage));
    for (index, slab) in slabs.iter_mut().enumerate() {
        slab.order = index as u32 + 1;
    }
}
