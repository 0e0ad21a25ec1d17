use std::fmt;

use serde::{Deserialize, Serialize};

/// Credit amount with 2 decimal places, stored as a scaled integer.
///
/// Negative values can be parsed; the ledger refuses to post them.
/// Plain `+` saturates, the ledger posts through [`Credits::checked_add`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Credits(i64);

impl Credits {
    const SCALE: i64 = 100;

    pub const ZERO: Credits = Credits(0);

    pub const fn whole(value: i64) -> Self {
        Credits(value * Self::SCALE)
    }

    /// `None` when `value` is not finite or does not fit once scaled.
    pub fn from_float(value: f64) -> Option<Self> {
        let scaled = (value * Self::SCALE as f64).round();
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Credits(scaled as i64))
    }

    pub const fn from_scaled(value: i64) -> Self {
        Credits(value)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Credits)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            write!(f, "{sign}{whole}.{frac:02}")
        }
    }
}

impl std::ops::Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Credits(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Credits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Credits::ZERO, |acc, c| acc + c)
    }
}
