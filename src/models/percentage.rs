//! Percentage value object.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Number of decimal places kept on achievement percentages.
pub const ACHIEVEMENT_SCALE: u32 = 2;

/// A non-negative percentage (`120` means 120%).
///
/// # Example
///
/// ```
/// use incentive_engine::models::Percentage;
/// use rust_decimal::Decimal;
///
/// let achievement = Percentage::achievement(Decimal::from(120000), Decimal::from(100000)).unwrap();
/// assert_eq!(achievement.value(), Decimal::from(120));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    /// Zero percent.
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);

    /// One hundred percent.
    pub const HUNDRED: Percentage = Percentage(Decimal::ONE_HUNDRED);

    /// Creates a percentage, rejecting negative values.
    pub fn new(value: Decimal) -> EngineResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(EngineError::validation(
                "percentage",
                format!("{} must not be negative", value),
            ));
        }
        Ok(Self(value))
    }

    /// Computes `actual / target × 100`, rounded to [`ACHIEVEMENT_SCALE`] places.
    ///
    /// A zero or negative target has no meaningful achievement and is rejected,
    /// as is a negative actual value.
    pub fn achievement(actual: Decimal, target: Decimal) -> EngineResult<Self> {
        if target <= Decimal::ZERO {
            return Err(EngineError::validation(
                "target_value",
                format!("target must be greater than zero, got {}", target),
            ));
        }
        if actual.is_sign_negative() && !actual.is_zero() {
            return Err(EngineError::validation(
                "actual_value",
                format!("actual must not be negative, got {}", actual),
            ));
        }
        let raw = actual
            .checked_div(target)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| {
                EngineError::validation(
                    "actual_value",
                    format!("achievement of {} against {} is out of range", actual, target),
                )
            })?;
        Self::new(raw.round_dp_with_strategy(ACHIEVEMENT_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Returns the percentage value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the percentage is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Percentage::new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(percentage: Percentage) -> Self {
        percentage.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}
