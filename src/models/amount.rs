//! Fixed-point currency amount.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of fractional digits used when no other scale is configured.
pub const DEFAULT_FRACTION_DIGITS: u32 = 2;

/// A signed amount in minor currency units (e.g. cents).
///
/// Arithmetic saturates at the `i64` bounds instead of wrapping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from a count of minor units.
    #[inline]
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the count of minor units.
    #[inline]
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is greater than zero.
    #[inline]
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is less than zero.
    #[inline]
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Converts to a decimal in major units with the given scale.
    #[inline]
    #[must_use]
    pub fn to_decimal(self, fraction_digits: u32) -> Decimal {
        Decimal::new(self.0, fraction_digits)
    }

    /// Converts a decimal in major units to minor units, rounding any
    /// excess precision half away from zero.
    ///
    /// Returns `None` if the result does not fit.
    #[inline]
    #[must_use]
    pub fn from_decimal(value: Decimal, fraction_digits: u32) -> Option<Self> {
        let mut scaled = value
            .round_dp_with_strategy(fraction_digits, RoundingStrategy::MidpointAwayFromZero);
        scaled.rescale(fraction_digits);
        if scaled.scale() != fraction_digits {
            return None;
        }
        i64::try_from(scaled.mantissa()).ok().map(Self)
    }
}

impl Add for Amount {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Amount {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Sum for Amount {
    #[inline]
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl core::fmt::Display for Amount {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.to_decimal(DEFAULT_FRACTION_DIGITS), f)
    }
}
