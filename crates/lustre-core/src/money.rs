//! # Money Module
//!
//! Integer-cent amounts and the single rounding rule of the order engine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Prices, tax, shipping, discounts and totals are all i64 cents.         │
//! │                                                                         │
//! │  Rounding happens in exactly one place: applying a basis-point rate.    │
//! │                                                                         │
//! │      amount × bps / 10_000   ──►  nearest cent, ties away from zero     │
//! │                                                                         │
//! │  Tax (7% of 333.33 = 23.3331 → 23.33) and percentage discounts          │
//! │  (12.5% of 0.20 = 0.025 → 0.03) go through the same path.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use lustre_core::money::Money;
//!
//! let line = Money::from_major(100) * 2;
//! assert_eq!(line.percent_bps(1_000), Money::from_major(20));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

/// An amount of money in cents.
///
/// Serializes as the bare cent count, so `Money::from_cents(22_400)` is
/// `22400` in JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Whole currency units, e.g. `from_major(100)` is 100.00.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
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

    /// The smaller of two amounts. Used to cap discounts at the subtotal.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }

    /// `None` on i64 overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Unit price × quantity, `None` on i64 overflow.
    #[inline]
    pub fn checked_mul(self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    /// `self × bps / 10_000`, rounded half away from zero.
    ///
    /// Computed in i128; the product of any i64 amount and u32 rate fits.
    pub fn percent_bps(&self, bps: u32) -> Money {
        let scaled = i128::from(self.0) * i128::from(bps);
        let scale = i128::from(BPS_SCALE);

        let mut cents = scaled / scale;
        if (scaled % scale).abs() * 2 >= scale {
            cents += scaled.signum();
        }
        Money(cents as i64)
    }
}

/// `-12.50` style, for logs and error messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

/// Unit price × quantity.
impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, quantity: i64) -> Money {
        Money(self.0 * quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Money::from_major(100).cents(), 10_000);
        assert_eq!(Money::from_cents(1099).cents(), 1099);
        assert!(Money::default().is_zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!(a.min(b), b);
        assert_eq!(b.min(a), b);
    }

    #[test]
    fn test_checked_arithmetic() {
        let half = Money::from_cents(i64::MAX / 2);
        assert_eq!(half.checked_mul(2), Some(Money::from_cents(i64::MAX - 1)));
        assert_eq!(half.checked_mul(3), None);
        assert_eq!(half.checked_add(half), Some(Money::from_cents(i64::MAX - 1)));
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    }

    #[test]
    fn test_seven_percent_of_two_hundred() {
        assert_eq!(Money::from_major(200).percent_bps(700), Money::from_major(14));
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        // 10.00 at 8.25% = 82.5 cents → 83
        assert_eq!(Money::from_cents(1000).percent_bps(825).cents(), 83);
        // 10 cents at 4% = 0.4 cents → 0
        assert_eq!(Money::from_cents(10).percent_bps(400).cents(), 0);
        // 2.5 rounds up to 3, not to even
        assert_eq!(Money::from_cents(50).percent_bps(500).cents(), 3);
        assert_eq!(Money::from_cents(-1000).percent_bps(825).cents(), -83);
    }

    #[test]
    fn test_full_rate_is_identity() {
        let amount = Money::from_cents(123_457);
        assert_eq!(amount.percent_bps(BPS_SCALE as u32), amount);
    }

    #[test]
    fn test_percent_of_large_amounts_does_not_overflow() {
        let big = Money::from_cents(i64::MAX / 2);
        assert_eq!(big.percent_bps(5_000).cents(), i64::MAX / 4 + 1);
    }

    #[test]
    fn test_serializes_as_plain_cents() {
        let json = serde_json::to_string(&Money::from_cents(22_400)).unwrap();
        assert_eq!(json, "22400");
    }
}
