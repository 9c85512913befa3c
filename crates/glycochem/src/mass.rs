// Standard Library Imports
use std::fmt::{self, Display, Formatter};

// External Crate Imports
use derive_more::{Add, AddAssign, Neg, Sub, SubAssign, Sum};
use rust_decimal::Decimal;
use serde::Serialize;

// Public API ==========================================================================================================

/// A monoisotopic mass in daltons, stored as an integer scaled by [`Mass::SCALE`]
///
/// Sums of scaled integers are exact, so masses are only converted to floating point at scoring boundaries.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    Serialize,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    Neg,
    Sum,
)]
pub struct Mass(i64);

impl Mass {
    pub const SCALE: i64 = 100_000;
    const DECIMAL_PLACES: u32 = 5;

    #[must_use]
    pub const fn from_scaled(scaled: i64) -> Self {
        Self(scaled)
    }

    /// Rounds a floating-point mass in daltons to the nearest representable scaled mass
    #[must_use]
    pub fn from_daltons(daltons: f64) -> Self {
        // NOTE: `as` saturates for out-of-range floats, which is fine for mass windows at the extremes
        Self((daltons * Self::SCALE as f64).round() as i64)
    }

    #[must_use]
    pub const fn scaled(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::DECIMAL_PLACES)
    }
}

impl Display for Mass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.to_decimal(), f)
    }
}

// Module Tests ========================================================================================================
