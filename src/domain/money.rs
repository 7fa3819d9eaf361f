//! Money type
//!
//! Domain primitive for prices and totals, expressed in integer minor units
//! (e.g. cents). All amounts are validated at construction time, ensuring
//! invalid values cannot exist in the system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Maximum allowed money value (10 million, in minor units)
const MAX_MINOR_UNITS: i64 = 1_000_000_000;

/// Money represents a validated non-negative monetary value in minor units.
///
/// # Invariants
/// - Value is always `>= 0`
/// - Maximum value is `MAX_MINOR_UNITS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

/// Errors that can occur when creating a Money value
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("money amount cannot be negative (got {0})")]
    Negative(i64),

    #[error("money amount exceeds maximum allowed value ({MAX_MINOR_UNITS})")]
    Overflow,
}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Create a new Money value with validation.
    pub fn new(minor_units: i64) -> Result<Self, MoneyError> {
        if minor_units < 0 {
            return Err(MoneyError::Negative(minor_units));
        }
        if minor_units > MAX_MINOR_UNITS {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(minor_units))
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Multiply by a non-negative quantity (for line-item subtotals).
    pub fn times(&self, quantity: u32) -> Result<Money, MoneyError> {
        Money::new(self.0 * i64::from(quantity))
    }

    pub fn try_add(&self, other: &Money) -> Result<Money, MoneyError> {
        Money::new(self.0 + other.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Money {
    type Error = MoneyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Result<Money, MoneyError>;

    fn add(self, rhs: Self) -> Self::Output {
        self.try_add(&rhs)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_zero_allowed() {
        let m = Money::new(0);
        assert!(m.is_ok());
        assert_eq!(m.unwrap().minor_units(), 0);
    }

    #[test]
    fn test_money_negative_rejected() {
        let m = Money::new(-100);
        assert!(matches!(m, Err(MoneyError::Negative(-100))));
    }

    #[test]
    fn test_money_overflow() {
        let m = Money::new(MAX_MINOR_UNITS + 1);
        assert!(matches!(m, Err(MoneyError::Overflow)));
    }

    #[test]
    fn test_money_times_quantity() {
        let unit_price = Money::new(1000).unwrap();
        let subtotal = unit_price.times(3).unwrap();
        assert_eq!(subtotal.minor_units(), 3000);
    }

    #[test]
    fn test_money_try_add() {
        let a = Money::new(2000).unwrap();
        let b = Money::new(300).unwrap();
        let total = a.try_add(&b).unwrap();
        assert_eq!(total.minor_units(), 2300);
    }
}
