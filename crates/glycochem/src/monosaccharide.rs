// External Crate Imports
use serde::Serialize;

// Local Crate Imports
use crate::Mass;

// Public API ==========================================================================================================

/// The number of slots in every [`Composition`](crate::Composition) vector
pub const MONOSACCHARIDE_KINDS: usize = 11;

/// The monosaccharides (and small substituents) that a glycan composition can count
///
/// Variants are declared in canonical slot order, so `Monosaccharide as usize` is the index of that monosaccharide's
/// count in a [`Composition`](crate::Composition).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum Monosaccharide {
    Hex,
    HexNAc,
    NeuAc,
    NeuGc,
    Fuc,
    Phospho,
    Sulfo,
    Na,
    Ac,
    Xylose,
    Kdn,
}

impl Monosaccharide {
    pub const ALL: [Self; MONOSACCHARIDE_KINDS] = [
        Self::Hex,
        Self::HexNAc,
        Self::NeuAc,
        Self::NeuGc,
        Self::Fuc,
        Self::Phospho,
        Self::Sulfo,
        Self::Na,
        Self::Ac,
        Self::Xylose,
        Self::Kdn,
    ];

    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// The one-letter code used in display strings (`H2N2A1`) and structural notation (`(N(H))`)
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Hex => 'H',
            Self::HexNAc => 'N',
            Self::NeuAc => 'A',
            Self::NeuGc => 'G',
            Self::Fuc => 'F',
            Self::Phospho => 'P',
            Self::Sulfo => 'S',
            Self::Na => 'Y',
            Self::Ac => 'C',
            Self::Xylose => 'X',
            Self::Kdn => 'K',
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hex => "Hex",
            Self::HexNAc => "HexNAc",
            Self::NeuAc => "NeuAc",
            Self::NeuGc => "NeuGc",
            Self::Fuc => "Fuc",
            Self::Phospho => "Phospho",
            Self::Sulfo => "Sulfo",
            Self::Na => "Na",
            Self::Ac => "Ac",
            Self::Xylose => "Xylose",
            Self::Kdn => "Kdn",
        }
    }

    /// Monoisotopic residue mass, stored as an integer scaled by 10^5
    #[must_use]
    pub const fn mass(self) -> Mass {
        Mass::from_scaled(match self {
            Self::Hex => 16_205_282,
            Self::HexNAc => 20_307_937,
            Self::NeuAc => 29_109_542,
            Self::NeuGc => 30_709_033,
            Self::Fuc => 14_605_791,
            Self::Phospho => 7_996_633,
            Self::Sulfo => 7_995_681,
            Self::Na => 2_298_977,
            Self::Ac => 4_201_056,
            Self::Xylose => 15_005_282,
            Self::Kdn => 25_006_897,
        })
    }

    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

// Module Tests ========================================================================================================
