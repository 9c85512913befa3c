// External Crate Imports
use glycochem::{GlycanBox, Mass, Monosaccharide};
use serde::Serialize;

// Local Crate Imports
use crate::{EnvelopeSource, Tolerance};

/// The mass of a proton, in Daltons
const PROTON: f64 = 1.007_276_466_812;

/// Singly-charged glycan oxonium ions, by m/z
pub const OXONIUM_IONS: [Mass; 17] = [
    Mass::from_scaled(10_902_895),
    Mass::from_scaled(11_503_951),
    Mass::from_scaled(12_605_550),
    Mass::from_scaled(12_703_952),
    Mass::from_scaled(13_805_550),
    Mass::from_scaled(14_406_607),
    Mass::from_scaled(16_306_064),
    Mass::from_scaled(16_806_607),
    Mass::from_scaled(18_607_663),
    Mass::from_scaled(20_408_720),
    Mass::from_scaled(27_409_268),
    Mass::from_scaled(29_008_759),
    Mass::from_scaled(29_210_324),
    Mass::from_scaled(30_809_816),
    Mass::from_scaled(36_614_002),
    Mass::from_scaled(65_723_544),
    Mass::from_scaled(67_323_035),
];

const HEXNAC_ION: usize = 9;
const NEUAC_IONS: [usize; 2] = [10, 12];
const NEUGC_IONS: [usize; 2] = [11, 13];

// Public API ==========================================================================================================

/// The intensity of every [`OXONIUM_IONS`] entry seen in a scan, or zero for those that weren't
#[derive(Copy, Clone, PartialEq, Debug, Serialize)]
pub struct OxoniumIntensities([f64; OXONIUM_IONS.len()]);

impl OxoniumIntensities {
    /// Takes the envelope closest to each oxonium ion's neutral mass, if it is within `tolerance`
    #[must_use]
    pub fn from_scan(scan: &impl EnvelopeSource, tolerance: Tolerance) -> Self {
        Self(OXONIUM_IONS.map(|ion| {
            let neutral_mass = ion.to_f64() - PROTON;
            scan.closest_envelope(neutral_mass)
                .filter(|envelope| tolerance.within(envelope.monoisotopic_mass, neutral_mass))
                .map_or(0.0, |envelope| envelope.intensity)
        }))
    }

    #[must_use]
    pub const fn intensities(&self) -> &[f64; OXONIUM_IONS.len()] {
        &self.0
    }

    /// Whether the 204.087 HexNAc oxonium ion was seen. Spectra without it are unlikely to be glycopeptides
    #[must_use]
    pub fn has_hexnac(&self) -> bool {
        self.0[HEXNAC_ION] > 0.0
    }

    /// A glycan box is ruled out when a sialic acid's oxonium ions were seen but the box carries none of it
    #[must_use]
    pub fn supports(&self, glycan_box: &GlycanBox) -> bool {
        let seen = |ions: [usize; 2]| ions.iter().any(|&ion| self.0[ion] > 0.0);
        let carries = |sialic_acid| glycan_box.composition().count(sialic_acid) > 0;
        (!seen(NEUAC_IONS) || carries(Monosaccharide::NeuAc))
            && (!seen(NEUGC_IONS) || carries(Monosaccharide::NeuGc))
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use glycochem::{Composition, GlycanDatabase, GlycanId};
    use once_cell::sync::Lazy;

    use super::*;
    use crate::{DeconvolutedScan, Envelope};

    // Tn, sialyl-Tn, and NeuGc-Tn
    static DB: Lazy<GlycanDatabase> = Lazy::new(|| {
        let compositions = ["HexNAc(1)", "HexNAc(1)NeuAc(1)", "HexNAc(1)NeuGc(1)"];
        GlycanDatabase::from_compositions(compositions.map(|c| Composition::new(c).unwrap())).unwrap()
    });

    fn glycan_box(id: usize) -> GlycanBox {
        GlycanBox::new(&DB, [GlycanId::from(id)]).unwrap()
    }

    fn scan(mzs: &[f64]) -> DeconvolutedScan {
        let envelopes = mzs
            .iter()
            .map(|mz| Envelope {
                monoisotopic_mass: mz - PROTON,
                charge: 1,
                intensity: 10.0,
            })
            .collect();
        DeconvolutedScan::new(envelopes, 100.0, 2)
    }

    #[test]
    fn oxonium_ions_are_read_from_scans() {
        let oxonium = OxoniumIntensities::from_scan(&scan(&[204.0872, 366.14]), Tolerance::Ppm(20.0));
        assert!(oxonium.has_hexnac());
        let seen: Vec<_> = (0..OXONIUM_IONS.len())
            .filter(|&ion| oxonium.intensities()[ion] > 0.0)
            .collect();
        assert_eq!(seen, [9, 14]);

        // 204.0900 is ~14 ppm away from the HexNAc ion
        let off = scan(&[204.0900]);
        assert!(OxoniumIntensities::from_scan(&off, Tolerance::Ppm(20.0)).has_hexnac());
        assert!(!OxoniumIntensities::from_scan(&off, Tolerance::Ppm(10.0)).has_hexnac());

        let empty = OxoniumIntensities::from_scan(&scan(&[]), Tolerance::Ppm(20.0));
        assert!(!empty.has_hexnac());
        assert!(empty.intensities().iter().all(|&i| i == 0.0));
    }

    #[test]
    fn sialic_acid_ions_need_sialylated_boxes() {
        let tolerance = Tolerance::Ppm(20.0);
        let (tn, sialyl_tn, neugc_tn) = (glycan_box(0), glycan_box(1), glycan_box(2));

        let plain = OxoniumIntensities::from_scan(&scan(&[204.0872]), tolerance);
        assert!(plain.supports(&tn) && plain.supports(&sialyl_tn) && plain.supports(&neugc_tn));

        let neuac = OxoniumIntensities::from_scan(&scan(&[204.0872, 274.0927, 292.1032]), tolerance);
        assert!(!neuac.supports(&tn));
        assert!(neuac.supports(&sialyl_tn));
        assert!(!neuac.supports(&neugc_tn));

        let neugc = OxoniumIntensities::from_scan(&scan(&[308.0982]), tolerance);
        assert!(!neugc.supports(&tn));
        assert!(!neugc.supports(&sialyl_tn));
        assert!(neugc.supports(&neugc_tn));
    }
}
