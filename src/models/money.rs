//! Money and currency value objects.
//!
//! [`Money`] pairs an exact decimal amount with a [`Currency`]. All arithmetic
//! is currency-checked: combining two amounts in different currencies fails
//! with [`EngineError::CurrencyMismatch`] instead of producing a value.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::Percentage;

/// An ISO-4217 style currency code (three upper-case ASCII letters).
///
/// # Example
///
/// ```
/// use incentive_engine::models::Currency;
///
/// let inr = Currency::new("INR").unwrap();
/// assert_eq!(inr.code(), "INR");
/// assert!(Currency::new("rupees").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from its code.
    pub fn new(code: impl Into<String>) -> EngineResult<Self> {
        let code = code.into();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(EngineError::validation(
                "currency",
                format!("'{}' is not a three-letter upper-case currency code", code),
            ));
        }
        Ok(Self(code))
    }

    /// Returns the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An exact monetary amount in a single currency.
///
/// # Example
///
/// ```
/// use incentive_engine::models::{Currency, Money, Percentage};
/// use rust_decimal::Decimal;
///
/// let inr = Currency::new("INR").unwrap();
/// let salary = Money::new(Decimal::from(50000), inr.clone());
/// let rate = Percentage::new(Decimal::from(10)).unwrap();
///
/// let payout = salary.percent_of(rate).unwrap();
/// assert_eq!(payout, Money::new(Decimal::from(5000), inr));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// The exact amount.
    pub amount: Decimal,
    /// The currency of the amount.
    pub currency: Currency,
}

impl Money {
    /// Creates a new amount.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    fn ensure_same_currency(&self, other: &Money) -> EngineResult<()> {
        if self.currency != other.currency {
            return Err(EngineError::CurrencyMismatch {
                expected: self.currency.to_string(),
                found: other.currency.to_string(),
            });
        }
        Ok(())
    }

    /// Adds two amounts of the same currency.
    pub fn add(&self, other: &Money) -> EngineResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| {
                EngineError::validation("amount", format!("{} + {} overflows", self, other))
            })?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Subtracts `other` from this amount.
    pub fn subtract(&self, other: &Money) -> EngineResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| {
                EngineError::validation("amount", format!("{} - {} overflows", self, other))
            })?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Returns `percentage` percent of this amount, without rounding.
    ///
    /// # Errors
    ///
    /// Fails with a validation error if the product does not fit a `Decimal`.
    pub fn percent_of(&self, percentage: Percentage) -> EngineResult<Money> {
        let amount = self
            .amount
            .checked_mul(percentage.value())
            .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(|| {
                EngineError::validation(
                    "amount",
                    format!("{} of {} overflows", percentage, self),
                )
            })?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Compares two amounts of the same currency.
    pub fn try_cmp(&self, other: &Money) -> EngineResult<Ordering> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Returns true if this amount is strictly greater than `other`.
    pub fn exceeds(&self, other: &Money) -> EngineResult<bool> {
        Ok(self.try_cmp(other)? == Ordering::Greater)
    }

    /// Returns the smaller of two amounts of the same currency.
    pub fn min(self, other: Money) -> EngineResult<Money> {
        Ok(if other.exceeds(&self)? { self } else { other })
    }

    /// Returns the amount rounded to cents, half away from zero.
    pub fn rounded(&self) -> Money {
        Money::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency.clone(),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}
