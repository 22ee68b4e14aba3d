//! Fixed-Point Money
//!
//! Balances and wagers are stored as integer hundredths so that debits,
//! credits and leaderboard sums are exact. Only the multiplier is a float.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Amount(u64)  = value in hundredths of a credit             │
//! │  Amount(100)  = 1.00                                        │
//! │  Amount(25000) = 250.00                                     │
//! │  Wire format  = decimal number (250.0)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::ops::Add;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hundredths per whole credit.
pub const AMOUNT_SCALE: u64 = 100;

/// Slack added before flooring a payout, absorbing binary float error
/// such as `2.4999999999999996` for a multiplier meant to be `2.5`.
const PAYOUT_EPSILON: f64 = 1e-6;

/// How far `units * 100` may sit from a whole number and still count as
/// whole hundredths (`10.1 * 100` is `1010.0000000000001`).
const HUNDREDTHS_EPSILON: f64 = 1e-6;

/// A non-negative quantity of credits in hundredths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Zero credits.
    pub const ZERO: Amount = Amount(0);

    /// Create from raw hundredths.
    pub const fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    /// Create from whole credits.
    pub const fn from_whole(units: u64) -> Self {
        Self(units * AMOUNT_SCALE)
    }

    /// Convert a decimal credit value, rounding to the nearest hundredth.
    ///
    /// Returns `None` for NaN, infinities, negatives and values that do
    /// not fit.
    pub fn from_units(units: f64) -> Option<Self> {
        if !units.is_finite() || units < 0.0 {
            return None;
        }
        let hundredths = (units * AMOUNT_SCALE as f64).round();
        if hundredths > u64::MAX as f64 {
            return None;
        }
        Some(Self(hundredths as u64))
    }

    /// Convert a decimal credit value that is already whole hundredths.
    ///
    /// Returns `None` for anything [`Amount::from_units`] rejects and for
    /// values with a sub-hundredth part, so the result is never larger or
    /// smaller than what was asked for.
    pub fn from_units_exact(units: f64) -> Option<Self> {
        let amount = Self::from_units(units)?;
        let scaled = units * AMOUNT_SCALE as f64;
        if (scaled - amount.0 as f64).abs() > HUNDREDTHS_EPSILON {
            return None;
        }
        Some(amount)
    }

    /// Raw hundredths.
    #[inline]
    pub const fn hundredths(self) -> u64 {
        self.0
    }

    /// Value as a decimal credit amount, for display and the wire.
    #[inline]
    pub fn to_units(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    /// Is this zero?
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract, or `None` if the result would be negative.
    #[inline]
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Add, clamping at the maximum representable amount.
    #[inline]
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Winnings for a wager cashed out at `multiplier`.
    ///
    /// Floors to the hundredth. The same value is credited at cash-out and
    /// recorded at settlement, so the two never disagree.
    pub fn payout(self, multiplier: f64) -> Amount {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Amount::ZERO;
        }
        let raw = (self.0 as f64 * multiplier + PAYOUT_EPSILON).floor();
        if raw >= u64::MAX as f64 {
            Amount(u64::MAX)
        } else {
            Amount(raw as u64)
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    #[inline]
    fn add(self, other: Amount) -> Amount {
        self.saturating_add(other)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / AMOUNT_SCALE, self.0 % AMOUNT_SCALE)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_units())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let units = f64::deserialize(deserializer)?;
        Amount::from_units(units)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", units)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
