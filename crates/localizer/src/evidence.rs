// Standard Library Imports
use std::ops::Range;

// External Crate Imports
use glycochem::GlycanBox;
use serde::Serialize;

// Public API ==========================================================================================================

/// Scores how well a partial assignment of glycans to sites is supported by a spectrum
pub trait LocalEvidence {
    /// The cost of having placed exactly the glycans of `child` on the sites up to and including `site_index`
    ///
    /// Only ever called for sites before the last one; the last row of a localization graph has no local cost.
    fn local_cost(&self, site_index: usize, child: &GlycanBox) -> f64;

    /// The cost of the fragments that don't discriminate between placements of the glycan box
    fn unlocalized_cost(&self) -> f64;
}

/// Adapts a closure (plus a fixed unlocalized cost) into [`LocalEvidence`]
#[derive(Copy, Clone, Debug)]
pub struct CostFn<F> {
    local: F,
    unlocalized: f64,
}

impl<F: Fn(usize, &GlycanBox) -> f64> CostFn<F> {
    pub const fn new(local: F, unlocalized: f64) -> Self {
        Self { local, unlocalized }
    }
}

impl<F: Fn(usize, &GlycanBox) -> f64> LocalEvidence for CostFn<F> {
    fn local_cost(&self, site_index: usize, child: &GlycanBox) -> f64 {
        (self.local)(site_index, child)
    }

    fn unlocalized_cost(&self) -> f64 {
        self.unlocalized
    }
}

// ---------------------------------------------------------------------------------------------------------------------

/// How far an observed mass may stray from a theoretical one
#[derive(Copy, Clone, PartialEq, Debug, Serialize)]
pub enum Tolerance {
    Ppm(f64),
    Absolute(f64),
}

impl Tolerance {
    #[must_use]
    pub fn bounds(self, mass: f64) -> (f64, f64) {
        let delta = match self {
            Self::Ppm(ppm) => mass * ppm / 1e6,
            Self::Absolute(daltons) => daltons,
        };
        (mass - delta, mass + delta)
    }

    /// The range of theoretical masses that `observed` would be [`Tolerance::within`]
    #[must_use]
    pub fn theoretical_bounds(self, observed: f64) -> (f64, f64) {
        match self {
            Self::Ppm(ppm) => {
                let error = ppm / 1e6;
                (observed / (1.0 + error), observed / (1.0 - error))
            }
            Self::Absolute(daltons) => (observed - daltons, observed + daltons),
        }
    }

    #[must_use]
    pub fn within(self, observed: f64, theoretical: f64) -> bool {
        let (low, high) = self.bounds(theoretical);
        (low..=high).contains(&observed)
    }

    /// The full width of the tolerance window centred on `mass`
    #[must_use]
    pub fn width_at(self, mass: f64) -> f64 {
        let (low, high) = self.bounds(mass);
        high - low
    }
}

// ---------------------------------------------------------------------------------------------------------------------

/// A deconvoluted isotopic envelope
#[derive(Copy, Clone, PartialEq, Debug, Serialize)]
pub struct Envelope {
    pub monoisotopic_mass: f64,
    pub charge: i32,
    pub intensity: f64,
}

/// A source of deconvoluted envelopes for one MS2 scan
pub trait EnvelopeSource {
    /// The envelope whose monoisotopic mass is closest to `mass`, if the scan has any envelopes at all
    fn closest_envelope(&self, mass: f64) -> Option<&Envelope>;

    fn total_ion_current(&self) -> f64;

    fn precursor_charge(&self) -> i32;
}

/// A minimal [`EnvelopeSource`] backed by a mass-sorted list of envelopes
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct DeconvolutedScan {
    envelopes: Vec<Envelope>,
    total_ion_current: f64,
    precursor_charge: i32,
}

impl DeconvolutedScan {
    #[must_use]
    pub fn new(mut envelopes: Vec<Envelope>, total_ion_current: f64, precursor_charge: i32) -> Self {
        envelopes.sort_by(|a, b| a.monoisotopic_mass.total_cmp(&b.monoisotopic_mass));
        Self {
            envelopes,
            total_ion_current,
            precursor_charge,
        }
    }

    #[must_use]
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// The span of monoisotopic masses covered by this scan's envelopes
    #[must_use]
    pub fn mass_range(&self) -> Option<Range<f64>> {
        let first = self.envelopes.first()?;
        let last = self.envelopes.last()?;
        Some(first.monoisotopic_mass..last.monoisotopic_mass)
    }
}

impl EnvelopeSource for DeconvolutedScan {
    fn closest_envelope(&self, mass: f64) -> Option<&Envelope> {
        let index = self
            .envelopes
            .partition_point(|e| e.monoisotopic_mass < mass);
        let above = self.envelopes.get(index);
        let below = index.checked_sub(1).and_then(|i| self.envelopes.get(i));
        match (below, above) {
            (Some(b), Some(a)) if mass - b.monoisotopic_mass <= a.monoisotopic_mass - mass => Some(b),
            (b, None) => b,
            (_, a) => a,
        }
    }

    fn total_ion_current(&self) -> f64 {
        self.total_ion_current
    }

    fn precursor_charge(&self) -> i32 {
        self.precursor_charge
    }
}

// ---------------------------------------------------------------------------------------------------------------------

/// A theoretical peptide fragment, before any glycans are added to it
#[derive(Copy, Clone, PartialEq, Debug, Serialize)]
pub struct Fragment {
    /// The position of the residue where this fragment ends (for c ions) or starts (for z• ions)
    pub position: usize,
    pub neutral_mass: f64,
}

/// The c and z• fragments of a bare peptide, which are what electron-based dissociation leaves glycans attached to
#[derive(Clone, PartialEq, Debug, Default, Serialize)]
pub struct FragmentLadder {
    pub c_ions: Vec<Fragment>,
    pub z_ions: Vec<Fragment>,
}

impl FragmentLadder {
    #[must_use]
    pub const fn new(c_ions: Vec<Fragment>, z_ions: Vec<Fragment>) -> Self {
        Self { c_ions, z_ions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.c_ions.len() + self.z_ions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`LocalEvidence`] from matching glycan-shifted c and z• fragments against a deconvoluted scan
///
/// Between two neighbouring sites, c ions carry the glycans already placed (the child box) and z• ions carry the rest
/// of the glycan box. Fragments outside the span of the sites carry either nothing or the whole box, no matter how the
/// glycans are arranged, so they only contribute to the unlocalized cost.
#[derive(Copy, Clone, Debug)]
pub struct FragmentEvidence<'e, S> {
    ladder: &'e FragmentLadder,
    sites: &'e [usize],
    box_mass: f64,
    scan: &'e S,
    tolerance: Tolerance,
}

impl<'e, S: EnvelopeSource> FragmentEvidence<'e, S> {
    pub fn new(
        ladder: &'e FragmentLadder,
        sites: &'e [usize],
        glycan_box: &GlycanBox,
        scan: &'e S,
        tolerance: Tolerance,
    ) -> Self {
        Self {
            ladder,
            sites,
            box_mass: glycan_box.mass().to_f64(),
            scan,
            tolerance,
        }
    }

    fn score(&self, theoretical_masses: impl IntoIterator<Item = f64>) -> f64 {
        let total_ion_current = self.scan.total_ion_current();
        let precursor_charge = self.scan.precursor_charge();
        theoretical_masses
            .into_iter()
            .filter_map(|mass| {
                let envelope = self.scan.closest_envelope(mass)?;
                (self.tolerance.within(envelope.monoisotopic_mass, mass)
                    && envelope.charge <= precursor_charge)
                    .then_some(envelope.intensity)
            })
            .map(|intensity| {
                if total_ion_current > 0.0 {
                    1.0 + intensity / total_ion_current
                } else {
                    1.0
                }
            })
            .sum()
    }

    fn shifted(
        ions: &[Fragment],
        positions: impl Fn(usize) -> bool,
        shift: f64,
    ) -> impl Iterator<Item = f64> + '_ {
        ions.iter()
            .filter(move |ion| positions(ion.position))
            .map(move |ion| ion.neutral_mass + shift)
    }
}

impl<S: EnvelopeSource> LocalEvidence for FragmentEvidence<'_, S> {
    fn local_cost(&self, site_index: usize, child: &GlycanBox) -> f64 {
        let (Some(&site), Some(&next_site)) =
            (self.sites.get(site_index), self.sites.get(site_index + 1))
        else {
            return 0.0;
        };
        let child_mass = child.mass().to_f64();

        let c_window = site.saturating_sub(1)..next_site.saturating_sub(1);
        let z_window = site..next_site;
        let c_ions = Self::shifted(&self.ladder.c_ions, |p| c_window.contains(&p), child_mass);
        let z_ions = Self::shifted(
            &self.ladder.z_ions,
            |p| z_window.contains(&p),
            self.box_mass - child_mass,
        );
        self.score(c_ions.chain(z_ions))
    }

    fn unlocalized_cost(&self) -> f64 {
        let (Some(&first), Some(&last)) = (self.sites.first(), self.sites.last()) else {
            return 0.0;
        };
        let (first, last) = (first.saturating_sub(1), last.saturating_sub(1));
        let c_ions = &self.ladder.c_ions;
        let z_ions = &self.ladder.z_ions;

        let bare = Self::shifted(c_ions, |p| p < first, 0.0)
            .chain(Self::shifted(z_ions, |p| p > last, 0.0));
        let glycosylated = Self::shifted(c_ions, |p| p >= last, self.box_mass)
            .chain(Self::shifted(z_ions, |p| p < first, self.box_mass));
        self.score(bare.chain(glycosylated))
    }
}

// Module Tests ========================================================================================================
