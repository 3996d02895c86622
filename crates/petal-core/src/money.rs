//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The shop prices in Vietnamese dong. The dong has no minor unit in     │
//! │  everyday use, so one Money unit is one dong and every amount is an    │
//! │  exact integer:                                                         │
//! │                                                                         │
//! │    Rose 10.000 ₫ × 3 stems = 30.000 ₫                                  │
//! │    minus 2.000 ₫ discount  = 28.000 ₫                                  │
//! │                                                                         │
//! │  Floats never enter the pipeline. Cart totals, debts and supplier      │
//! │  balances all add up to the dong.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use petal_core::money::Money;
//!
//! let price = Money::from_amount(10_000);
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.amount(), 30_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// A monetary value in dong.
///
/// ## Design Decisions
/// - **i64 (signed)**: discounts and adjustments may be negative mid-calculation
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Transparent serde**: serialized as a bare integer on the wire
/// - **Saturating operators**: `+`, `-` and `*` clamp at the `i64` bounds;
///   totals built from request input go through the `checked_*` methods
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from a whole dong amount.
    #[inline]
    pub const fn from_amount(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount in dong.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use petal_core::money::Money;
    ///
    /// let stem = Money::from_amount(12_500);
    /// assert_eq!(stem.multiply_quantity(4).amount(), 50_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies by a quantity, or `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Subtracts `other`, clamping at zero.
    ///
    /// Outstanding balances are computed this way: an overpayment leaves no
    /// debt, it never produces a negative one.
    ///
    /// ## Example
    /// ```rust
    /// use petal_core::money::Money;
    ///
    /// let total = Money::from_amount(30_000);
    /// assert_eq!(total.saturating_sub_floor_zero(Money::from_amount(10_000)).amount(), 20_000);
    /// assert!(total.saturating_sub_floor_zero(Money::from_amount(50_000)).is_zero());
    /// ```
    #[inline]
    pub const fn saturating_sub_floor_zero(&self, other: Money) -> Self {
        let diff = self.0.saturating_sub(other.0);
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }
}

/// Formats as `30.000 ₫`: dot-grouped thousands, trailing currency sign.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{} ₫", sign, grouped)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_amount(0).to_string(), "0 ₫");
        assert_eq!(Money::from_amount(950).to_string(), "950 ₫");
        assert_eq!(Money::from_amount(30_000).to_string(), "30.000 ₫");
        assert_eq!(Money::from_amount(1_250_000).to_string(), "1.250.000 ₫");
        assert_eq!(Money::from_amount(-45_500).to_string(), "-45.500 ₫");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_amount(10_000);
        let b = Money::from_amount(2_500);

        assert_eq!((a + b).amount(), 12_500);
        assert_eq!((a - b).amount(), 7_500);
        assert_eq!((a * 3).amount(), 30_000);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = Money::from_amount(i64::MAX / 2);

        assert_eq!(huge.checked_multiply_quantity(3), None);
        assert_eq!(huge.checked_add(huge + Money::from_amount(2)), None);
        assert_eq!(Money::from_amount(i64::MIN).checked_sub(Money::from_amount(1)), None);
        assert_eq!(
            Money::from_amount(12_500).checked_multiply_quantity(4),
            Some(Money::from_amount(50_000))
        );

        // operators clamp instead of wrapping
        assert_eq!((huge * 3).amount(), i64::MAX);
        assert_eq!((huge + huge + huge).amount(), i64::MAX);
        assert!(huge.saturating_sub_floor_zero(Money::from_amount(i64::MIN)).is_positive());
    }

    #[test]
    fn test_sum() {
        let total: Money = [10_000, 20_000, 5_000]
            .into_iter()
            .map(Money::from_amount)
            .sum();
        assert_eq!(total.amount(), 35_000);
    }

    #[test]
    fn test_floor_zero_subtraction() {
        let total = Money::from_amount(30_000);
        assert_eq!(
            total.saturating_sub_floor_zero(Money::from_amount(30_000)),
            Money::zero()
        );
        assert_eq!(
            total
                .saturating_sub_floor_zero(Money::from_amount(12_000))
                .amount(),
            18_000
        );
    }

    #[test]
    fn test_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Money::from_amount(42_000)).unwrap();
        assert_eq!(json, "42000");
    }
}
