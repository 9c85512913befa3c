// Standard Library Imports
use std::{
    fmt::{self, Display, Formatter},
    iter::{Sum, zip},
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

// External Crate Imports
use serde::Serialize;

// Local Crate Imports
use crate::{
    MONOSACCHARIDE_KINDS, Mass, Monosaccharide, Result,
    errors::GlycochemError,
    parsers::{composition, final_parser, structure},
};

// Public API ==========================================================================================================

/// Counts of each [`Monosaccharide`], indexed by [`Monosaccharide::slot`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize)]
pub struct Composition([u32; MONOSACCHARIDE_KINDS]);

impl Composition {
    #[must_use]
    pub const fn from_counts(counts: [u32; MONOSACCHARIDE_KINDS]) -> Self {
        Self(counts)
    }

    /// Parses a flat composition listing, like `HexNAc(2)Hex(5)Fuc(1)`
    pub fn new(listing: impl AsRef<str>) -> Result<Self> {
        final_parser(composition)(listing.as_ref())
            .map_err(|e| Box::new(GlycochemError::from(e)))
    }

    /// Counts the nodes of a glycan written in structural bracket notation, like `(N(H(A))(F))`
    pub fn from_structure(structure_text: impl AsRef<str>) -> Result<Self> {
        final_parser(structure)(structure_text.as_ref())
            .map_err(|e| Box::new(GlycochemError::from(e)))
    }

    #[must_use]
    pub const fn count(&self, monosaccharide: Monosaccharide) -> u32 {
        self.0[monosaccharide.slot()]
    }

    #[must_use]
    pub const fn counts(&self) -> &[u32; MONOSACCHARIDE_KINDS] {
        &self.0
    }

    /// The total number of monosaccharides counted
    #[must_use]
    pub fn len(&self) -> u32 {
        self.0.iter().sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }

    #[must_use]
    pub fn mass(&self) -> Mass {
        zip(Monosaccharide::ALL, self.0)
            .map(|(monosaccharide, count)| {
                Mass::from_scaled(monosaccharide.mass().scaled() * i64::from(count))
            })
            .sum()
    }

    /// Returns `true` if every count in `other` is less than or equal to the matching count in `self`
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        zip(self.0, other.0).all(|(ours, theirs)| theirs <= ours)
    }

    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let mut counts = self.0;
        for (count, &removed) in zip(&mut counts, &rhs.0) {
            *count = count.checked_sub(removed)?;
        }
        Some(Self(counts))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Monosaccharide, u32)> + '_ {
        zip(Monosaccharide::ALL, self.0).filter(|&(_, count)| count > 0)
    }
}

impl From<Monosaccharide> for Composition {
    fn from(monosaccharide: Monosaccharide) -> Self {
        let mut counts = [0; MONOSACCHARIDE_KINDS];
        counts[monosaccharide.slot()] = 1;
        Self(counts)
    }
}

impl FromStr for Composition {
    type Err = Box<GlycochemError>;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

// Arithmetic ==========================================================================================================

impl Add for Composition {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for Composition {
    fn add_assign(&mut self, rhs: Self) {
        for (count, added) in zip(&mut self.0, rhs.0) {
            *count += added;
        }
    }
}

/// Element-wise subtraction
///
/// Removing more of a monosaccharide than is present is a logic error: it panics in debug builds and saturates at zero
/// in release builds. Use [`Composition::checked_sub`] when the subtrahend isn't known to be contained in `self`.
impl Sub for Composition {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        debug_assert!(
            self.contains(&rhs),
            "attempted to subtract {rhs} from the smaller composition {self}"
        );
        let mut counts = self.0;
        for (count, removed) in zip(&mut counts, rhs.0) {
            *count = count.saturating_sub(removed);
        }
        Self(counts)
    }
}

impl Sum for Composition {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for Composition {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// Display =============================================================================================================

impl Display for Composition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (monosaccharide, count) in self.iter() {
            write!(f, "{}{count}", monosaccharide.code())?;
        }
        Ok(())
    }
}

// Module Tests ========================================================================================================
