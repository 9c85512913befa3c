// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use glycochem::GlycanId;
use serde::Serialize;
use statrs::distribution::{Binomial, Discrete, DiscreteCDF};

// Local Crate Imports
use crate::{Route, Tolerance};

// Public API ==========================================================================================================

/// Models the number of fragments that match a spectrum by chance as `Binomial(n, p)`
#[derive(Copy, Clone, PartialEq, Debug, Serialize)]
pub struct RandomMatchModel {
    p: f64,
    n: u64,
}

impl RandomMatchModel {
    /// `p` is the chance of a single theoretical fragment matching at random, and `n` is the number of fragments tried
    #[must_use]
    pub const fn new(p: f64, n: u64) -> Self {
        Self { p, n }
    }

    /// The chance of a fragment landing within `tolerance` of one of `peak_count` peaks, spread across a mass range
    /// `mass_range_width` daltons wide
    #[must_use]
    pub fn random_match_probability(
        peak_count: usize,
        mass_range_width: f64,
        tolerance: Tolerance,
    ) -> f64 {
        if mass_range_width <= 0.0 {
            return 0.0;
        }
        (peak_count as f64 * tolerance.width_at(1000.0) / mass_range_width).min(1.0)
    }

    #[must_use]
    pub const fn p(&self) -> f64 {
        self.p
    }

    #[must_use]
    pub const fn n(&self) -> u64 {
        self.n
    }

    /// The inverse of the chance of matching at least `floor(score)` fragments at random
    ///
    /// Degenerate models (`p` outside of `(0, 1)`, or `n == 0`) weigh every score equally, returning 1.
    #[must_use]
    pub fn reverse_p(&self, score: f64) -> f64 {
        if !(self.p > 0.0 && self.p < 1.0) || self.n == 0 {
            return 1.0;
        }
        let Ok(binomial) = Binomial::new(self.p, self.n) else {
            return 1.0;
        };

        // NOTE: Float to integer `as` casts saturate, so a NaN score is treated as 0
        let k = (score.floor() as u64).min(self.n);
        let at_least_k = binomial.sf(k) + binomial.pmf(k);
        1.0 / at_least_k.max(f64::MIN_POSITIVE)
    }
}

/// A probability for every glycan that some route places at a site
pub type SiteGlycanProbabilities = Vec<(GlycanId, f64)>;

/// Site-specific localization probabilities, weighing each feasible route by its reverse-P
#[derive(Clone, PartialEq, Debug, Default, Serialize)]
pub struct SiteProbabilities(BTreeMap<usize, SiteGlycanProbabilities>);

impl SiteProbabilities {
    /// Every site in `sites` gets an entry (perhaps empty), and each site lists glycans in the order they were first
    /// seen in `routes`
    pub fn from_routes<'r>(
        routes: impl IntoIterator<Item = &'r Route> + Clone,
        sites: &[usize],
    ) -> Self {
        let total_weight: f64 = routes.clone().into_iter().map(Route::reverse_p).sum();
        let mut probabilities: BTreeMap<_, SiteGlycanProbabilities> =
            sites.iter().map(|&site| (site, Vec::new())).collect();

        for route in routes {
            let weight = route.reverse_p() / total_weight;
            for assignment in route.assignments() {
                let glycans = probabilities.entry(assignment.site).or_default();
                match glycans.iter_mut().find(|(id, _)| *id == assignment.glycan) {
                    Some((_, probability)) => *probability += weight,
                    None => glycans.push((assignment.glycan, weight)),
                }
            }
        }

        Self(probabilities)
    }

    /// The probability that `glycan` sits at `site`, or `None` if no route ever put it there
    #[must_use]
    pub fn get(&self, site: usize, glycan: GlycanId) -> Option<f64> {
        self.0
            .get(&site)?
            .iter()
            .find_map(|&(id, probability)| (id == glycan).then_some(probability))
    }

    #[must_use]
    pub fn site(&self, site: usize) -> Option<&[(GlycanId, f64)]> {
        self.0.get(&site).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[(GlycanId, f64)])> {
        self.0.iter().map(|(&site, glycans)| (site, glycans.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Module Tests ========================================================================================================
