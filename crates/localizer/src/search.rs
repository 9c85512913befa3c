// Standard Library Imports
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Instant,
};

// External Crate Imports
use glycochem::{
    GlycanBox, GlycanBoxes, GlycanDatabase, Mass, build_boxes, build_boxes_with_decoys,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::{ThreadPoolBuilder, prelude::*};
use serde::Serialize;
use tracing::{debug, info, warn};

// Local Crate Imports
use crate::{
    EnvelopeSource, FragmentEvidence, FragmentLadder, Localization, LocalizationGraph,
    LocalizationSettings, OxoniumIntensities, RandomMatchModel, Result,
};

const PROGRESS_INTERVAL: usize = 1000;

// Public API ==========================================================================================================

/// A bare peptide that has already matched a spectrum, along with the residues that could carry glycans
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct PeptideCandidate {
    monoisotopic_mass: f64,
    sites: Vec<usize>,
    fragments: FragmentLadder,
}

impl PeptideCandidate {
    /// Sites are sorted and deduplicated
    #[must_use]
    pub fn new(monoisotopic_mass: f64, mut sites: Vec<usize>, fragments: FragmentLadder) -> Self {
        sites.sort_unstable();
        sites.dedup();
        Self {
            monoisotopic_mass,
            sites,
            fragments,
        }
    }

    #[must_use]
    pub const fn monoisotopic_mass(&self) -> f64 {
        self.monoisotopic_mass
    }

    #[must_use]
    pub fn sites(&self) -> &[usize] {
        &self.sites
    }

    #[must_use]
    pub const fn fragments(&self) -> &FragmentLadder {
        &self.fragments
    }
}

/// One MS2 scan to localize glycans in, and the peptides that it has matched
#[derive(Clone, Debug)]
pub struct SpectrumQuery<S> {
    pub scan: S,
    pub precursor_mass: f64,
    /// The chance of a theoretical fragment matching this scan at random (see
    /// [`RandomMatchModel::random_match_probability`])
    pub random_match_probability: f64,
    pub candidates: Vec<PeptideCandidate>,
}

/// The best localization of glycans onto one of a spectrum's peptide candidates
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct CandidateLocalization {
    /// An index into [`SpectrumQuery::candidates`]
    pub candidate: usize,
    /// Every glycan box that tied for the best score, in order of mass
    pub glycan_boxes: Vec<GlycanBox>,
    pub localization: Localization,
}

impl CandidateLocalization {
    #[must_use]
    pub const fn total_score(&self) -> f64 {
        self.localization.total_score()
    }

    /// Whether the best glycan box is a decoy
    #[must_use]
    pub fn is_decoy(&self) -> bool {
        self.glycan_boxes.first().is_some_and(GlycanBox::is_decoy)
    }
}

/// The results of [`Localizer::run`], one for each query
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct SearchOutcome {
    /// `None` for any query that was skipped after the run was cancelled
    pub results: Vec<Option<Vec<CandidateLocalization>>>,
    pub cancelled: bool,
}

/// Localizes glycans across many spectra, sharing one glycan box universe
#[derive(Clone, Debug)]
pub struct Localizer<'db> {
    db: &'db GlycanDatabase,
    boxes: GlycanBoxes,
    settings: LocalizationSettings,
}

impl<'db> Localizer<'db> {
    pub fn new(db: &'db GlycanDatabase, settings: LocalizationSettings) -> Result<Self> {
        let boxes = if settings.decoys {
            let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
            let boxes = build_boxes_with_decoys(db, settings.max_glycans, &mut rng);
            GlycanBoxes::with_decoys(db, boxes, &mut rng)?
        } else {
            GlycanBoxes::new(db, build_boxes(db, settings.max_glycans))?
        };
        info!(
            glycans = db.len(),
            boxes = boxes.len(),
            decoys = settings.decoys,
            "built glycan boxes"
        );

        Ok(Self {
            db,
            boxes,
            settings,
        })
    }

    #[must_use]
    pub const fn db(&self) -> &'db GlycanDatabase {
        self.db
    }

    #[must_use]
    pub const fn boxes(&self) -> &GlycanBoxes {
        &self.boxes
    }

    #[must_use]
    pub const fn settings(&self) -> &LocalizationSettings {
        &self.settings
    }

    /// Fills `matched` with the indices of every glycan box that could make up the mass difference between
    /// `precursor_mass` and `candidate`, and that has few enough glycans to fit on its sites
    pub fn matching_boxes(
        &self,
        precursor_mass: f64,
        candidate: &PeptideCandidate,
        matched: &mut Vec<usize>,
    ) {
        matched.clear();
        let tolerance = self.settings.precursor_tolerance;
        let (low, high) = tolerance.theoretical_bounds(precursor_mass);
        let peptide_mass = candidate.monoisotopic_mass;
        let (low, high) = (
            Mass::from_daltons(low - peptide_mass) - Mass::from_scaled(1),
            Mass::from_daltons(high - peptide_mass) + Mass::from_scaled(1),
        );

        matched.extend(self.boxes.within(low, high).filter(|&index| {
            self.boxes.get(index).is_some_and(|glycan_box| {
                glycan_box.number_of_mods() <= candidate.sites.len()
                    && tolerance.within(precursor_mass, peptide_mass + glycan_box.mass().to_f64())
            })
        }));
    }

    /// Localizes every matching glycan box onto `candidate`, keeping only the best scoring box (and its ties)
    ///
    /// Returns `None` if no glycan box matches, or if no glycan box has any supporting evidence at all. With
    /// [`LocalizationSettings::oxonium_filter`] set, boxes that the scan's oxonium ions rule out are never localized.
    pub fn localize_candidate<S: EnvelopeSource>(
        &self,
        query: &SpectrumQuery<S>,
        candidate: usize,
    ) -> Result<Option<CandidateLocalization>> {
        let oxonium = self.oxonium_intensities(query);
        self.localize_candidate_with(query, candidate, oxonium.as_ref(), &mut Vec::new())
    }

    /// Localizes every candidate of a spectrum, best first
    ///
    /// With [`LocalizationSettings::oxonium_filter`] set, a spectrum without the HexNAc oxonium ion has no results.
    pub fn localize_spectrum<S: EnvelopeSource>(
        &self,
        query: &SpectrumQuery<S>,
    ) -> Result<Vec<CandidateLocalization>> {
        self.localize_spectrum_with(query, &mut Vec::new())
    }

    /// Localizes every spectrum in parallel, checking `cancel` before starting on each one
    ///
    /// Each worker thread takes every `threads`-th spectrum, starting from its own index.
    pub fn run<S: EnvelopeSource + Sync>(
        &self,
        queries: &[SpectrumQuery<S>],
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome> {
        let threads = self.settings.threads.max(1);
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        let progress = AtomicUsize::new(0);
        let start = Instant::now();
        info!(spectra = queries.len(), threads, "localizing glycans");

        let worker_results = pool.install(|| {
            (0..threads)
                .into_par_iter()
                .map(|worker| {
                    let mut matched = Vec::new();
                    let mut results = Vec::new();
                    for index in (worker..queries.len()).step_by(threads) {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        let localizations = self.localize_spectrum_with(&queries[index], &mut matched)?;
                        results.push((index, localizations));

                        let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                        if done % PROGRESS_INTERVAL == 0 {
                            debug!(done, total = queries.len(), "localized spectra");
                        }
                    }
                    Ok(results)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut results: Vec<_> = queries.iter().map(|_| None).collect();
        for (index, localizations) in worker_results.into_iter().flatten() {
            results[index] = Some(localizations);
        }

        let done = progress.into_inner();
        let cancelled = done < queries.len();
        if cancelled {
            warn!(done, total = queries.len(), "localization was cancelled");
        }
        info!(
            spectra = done,
            elapsed = ?start.elapsed(),
            "finished localizing glycans"
        );

        Ok(SearchOutcome { results, cancelled })
    }

    fn localize_spectrum_with<S: EnvelopeSource>(
        &self,
        query: &SpectrumQuery<S>,
        matched: &mut Vec<usize>,
    ) -> Result<Vec<CandidateLocalization>> {
        let oxonium = self.oxonium_intensities(query);
        if oxonium.as_ref().is_some_and(|oxonium| !oxonium.has_hexnac()) {
            debug!("skipped spectrum without a HexNAc oxonium ion");
            return Ok(Vec::new());
        }

        let mut localizations = Vec::new();
        for candidate in 0..query.candidates.len() {
            if let Some(localization) =
                self.localize_candidate_with(query, candidate, oxonium.as_ref(), matched)?
            {
                localizations.push(localization);
            }
        }
        localizations.sort_by(|a, b| b.total_score().total_cmp(&a.total_score()));
        Ok(localizations)
    }

    fn localize_candidate_with<S: EnvelopeSource>(
        &self,
        query: &SpectrumQuery<S>,
        candidate_index: usize,
        oxonium: Option<&OxoniumIntensities>,
        matched: &mut Vec<usize>,
    ) -> Result<Option<CandidateLocalization>> {
        let Some(candidate) = query.candidates.get(candidate_index) else {
            return Ok(None);
        };
        self.matching_boxes(query.precursor_mass, candidate, matched);

        let tie_tolerance = self.settings.score_tie_tolerance;
        let mut best_score = 0.0;
        let mut graphs = Vec::new();
        let mut glycan_boxes = Vec::new();
        for &index in matched.iter() {
            let Some(glycan_box) = self.boxes.get(index) else {
                continue;
            };
            if oxonium.is_some_and(|oxonium| !oxonium.supports(glycan_box)) {
                continue;
            }
            let evidence = FragmentEvidence::new(
                &candidate.fragments,
                &candidate.sites,
                glycan_box,
                &query.scan,
                self.settings.product_tolerance,
            );
            let graph = LocalizationGraph::build(
                &candidate.sites,
                glycan_box,
                self.boxes.children(index),
                &evidence,
            )?;

            let score = graph.total_score();
            if score > best_score {
                best_score = score;
                graphs.clear();
                glycan_boxes.clear();
            } else if best_score <= 0.0 || (score - best_score).abs() > tie_tolerance {
                continue;
            }
            graphs.push(graph);
            glycan_boxes.push(glycan_box.clone());
        }

        let model = RandomMatchModel::new(
            query.random_match_probability,
            candidate.fragments.len() as u64,
        );
        let localization =
            Localization::new(&graphs, &model, self.settings.min_site_probability);
        debug!(
            candidate = candidate_index,
            matched = matched.len(),
            tied = graphs.len(),
            best_score,
            "localized peptide candidate"
        );

        Ok(localization.map(|localization| CandidateLocalization {
            candidate: candidate_index,
            glycan_boxes,
            localization,
        }))
    }

    fn oxonium_intensities<S: EnvelopeSource>(&self, query: &SpectrumQuery<S>) -> Option<OxoniumIntensities> {
        self.settings
            .oxonium_filter
            .then(|| OxoniumIntensities::from_scan(&query.scan, self.settings.product_tolerance))
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use glycochem::{Composition, GlycanId};
    use once_cell::sync::Lazy;

    use super::*;
    use crate::{DeconvolutedScan, Envelope, Fragment, LocalizationLevel, Tolerance};

    // Tn, T antigen, and sialyl-Tn
    static DB: Lazy<GlycanDatabase> = Lazy::new(|| {
        let compositions = ["HexNAc(1)", "HexNAc(1)Hex(1)", "HexNAc(1)NeuAc(1)"];
        GlycanDatabase::from_compositions(compositions.map(|c| Composition::new(c).unwrap())).unwrap()
    });

    const PEPTIDE_MASS: f64 = 1000.0;

    fn settings() -> LocalizationSettings {
        LocalizationSettings {
            max_glycans: 2,
            threads: 2,
            ..LocalizationSettings::default()
        }
    }

    fn glycan_mass(id: usize) -> f64 {
        DB.get(GlycanId::from(id)).unwrap().mass().to_f64()
    }

    // An eight-residue peptide with c ions at 100 Da steps and z• ions at 100 Da steps above 1000 Da
    fn ladder() -> FragmentLadder {
        FragmentLadder::new(
            (1..8)
                .map(|position| Fragment {
                    position,
                    neutral_mass: 100.0 * position as f64,
                })
                .collect(),
            (2..9)
                .map(|position| Fragment {
                    position,
                    neutral_mass: 1000.0 + 100.0 * position as f64,
                })
                .collect(),
        )
    }

    // T antigen on site 3 and Tn on site 6, seen through c3 to c5 and z4 to z6
    fn scan() -> DeconvolutedScan {
        let (t_antigen, tn) = (glycan_mass(1), glycan_mass(0));
        let envelope = |monoisotopic_mass| Envelope {
            monoisotopic_mass,
            charge: 1,
            intensity: 50.0,
        };
        DeconvolutedScan::new(
            vec![
                envelope(300.0 + t_antigen),
                envelope(400.0 + t_antigen),
                envelope(1500.0 + tn),
                envelope(1400.0 + tn),
            ],
            200.0,
            2,
        )
    }

    fn query(precursor_mass: f64) -> SpectrumQuery<DeconvolutedScan> {
        SpectrumQuery {
            scan: scan(),
            precursor_mass,
            random_match_probability: 0.01,
            candidates: vec![PeptideCandidate::new(PEPTIDE_MASS, vec![6, 3, 6], ladder())],
        }
    }

    fn true_precursor_mass() -> f64 {
        PEPTIDE_MASS + glycan_mass(0) + glycan_mass(1)
    }

    #[test]
    fn candidates_have_sorted_sites() {
        let candidate = PeptideCandidate::new(PEPTIDE_MASS, vec![6, 3, 6], ladder());
        assert_eq!(candidate.sites(), [3, 6]);
        assert_eq!(candidate.fragments().len(), 14);
        assert_eq!(candidate.monoisotopic_mass(), PEPTIDE_MASS);
    }

    #[test]
    fn boxes_are_matched_by_mass() {
        let localizer = Localizer::new(&DB, settings()).unwrap();
        assert_eq!(localizer.boxes().len(), 3 + 6);

        let candidate = PeptideCandidate::new(PEPTIDE_MASS, vec![3, 6], ladder());
        let mut matched = Vec::new();
        localizer.matching_boxes(true_precursor_mass(), &candidate, &mut matched);
        assert_eq!(matched.len(), 1);
        let glycan_box = localizer.boxes().get(matched[0]).unwrap();
        assert_eq!(glycan_box.id_string(), "0,1");

        // 5 ppm off is still a match, but 15 ppm isn't
        let precursor = true_precursor_mass();
        localizer.matching_boxes(precursor * (1.0 + 5e-6), &candidate, &mut matched);
        assert_eq!(matched.len(), 1);
        localizer.matching_boxes(precursor * (1.0 + 15e-6), &candidate, &mut matched);
        assert!(matched.is_empty());

        // Two glycans won't fit on a single site
        let one_site = PeptideCandidate::new(PEPTIDE_MASS, vec![3], ladder());
        localizer.matching_boxes(precursor, &one_site, &mut matched);
        assert!(matched.is_empty());
    }

    #[test]
    fn candidates_are_localized() {
        let localizer = Localizer::new(&DB, settings()).unwrap();
        let localization = localizer
            .localize_candidate(&query(true_precursor_mass()), 0)
            .unwrap()
            .unwrap();

        assert_eq!(localization.candidate, 0);
        assert_eq!(localization.glycan_boxes.len(), 1);
        assert!(!localization.is_decoy());

        let best = localization.localization.best_route();
        let placements: Vec<_> = best
            .assignments()
            .iter()
            .map(|a| (a.site, usize::from(a.glycan)))
            .collect();
        assert_eq!(placements, [(3, 1), (6, 0)]);
        assert_eq!(localization.localization.level(), LocalizationLevel::Level1);
        assert!(localization.total_score() > 4.0);
    }

    #[test]
    fn unmatched_candidates_are_skipped() {
        let localizer = Localizer::new(&DB, settings()).unwrap();
        let query = query(PEPTIDE_MASS + 5000.0);
        assert_eq!(localizer.localize_candidate(&query, 0).unwrap(), None);
        assert_eq!(localizer.localize_candidate(&query, 1).unwrap(), None);
        assert!(localizer.localize_spectrum(&query).unwrap().is_empty());
    }

    #[test]
    fn parallel_runs_match_serial_results() {
        let localizer = Localizer::new(&DB, settings()).unwrap();
        let queries: Vec<_> = (0..7)
            .map(|i| {
                if i % 3 == 0 {
                    query(PEPTIDE_MASS + 5000.0)
                } else {
                    query(true_precursor_mass())
                }
            })
            .collect();

        let outcome = localizer.run(&queries, &AtomicBool::new(false)).unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.results.len(), queries.len());
        for (query, result) in queries.iter().zip(&outcome.results) {
            let serial = localizer.localize_spectrum(query).unwrap();
            assert_eq!(result.as_ref(), Some(&serial));
        }
        assert!(outcome.results[0].as_ref().unwrap().is_empty());
        assert_eq!(outcome.results[1].as_ref().unwrap().len(), 1);
    }

    #[test]
    fn cancelled_runs_skip_everything() {
        let localizer = Localizer::new(&DB, settings()).unwrap();
        let queries = vec![query(true_precursor_mass()); 4];
        let outcome = localizer.run(&queries, &AtomicBool::new(true)).unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.results.iter().all(Option::is_none));

        let outcome = localizer.run(&[] as &[SpectrumQuery<DeconvolutedScan>], &AtomicBool::new(true));
        assert!(!outcome.unwrap().cancelled);
    }

    #[test]
    fn decoy_boxes_are_searched_too() {
        let settings = LocalizationSettings {
            decoys: true,
            seed: 3,
            ..settings()
        };
        let localizer = Localizer::new(&DB, settings).unwrap();
        assert_eq!(localizer.boxes().len(), 2 * (3 + 6));
        assert_eq!(localizer.boxes().iter().filter(|b| b.is_decoy()).count(), 3 + 6);

        let again = Localizer::new(&DB, localizer.settings().clone()).unwrap();
        assert_eq!(again.boxes(), localizer.boxes());

        // Only the child boxes of decoys are perturbed, down to the empty box
        let boxes = localizer.boxes();
        for (index, glycan_box) in boxes.iter().enumerate() {
            let children = boxes.children(index);
            assert!(children.iter().all(|child| child.is_decoy() == glycan_box.is_decoy()));
            assert!(children[0].is_empty());
            assert_eq!(children[0].mass() == Mass::default(), !glycan_box.is_decoy());
        }
    }

    #[test]
    fn oxonium_ions_filter_spectra_and_boxes() {
        let settings = LocalizationSettings {
            oxonium_filter: true,
            ..settings()
        };
        let localizer = Localizer::new(&DB, settings).unwrap();
        let unfiltered = Localizer::new(&DB, self::settings()).unwrap();

        // No HexNAc oxonium ion, so the spectrum is skipped
        let mut query = query(true_precursor_mass());
        assert!(localizer.localize_spectrum(&query).unwrap().is_empty());
        assert_eq!(unfiltered.localize_spectrum(&query).unwrap().len(), 1);

        let oxonium = |mz: f64| Envelope {
            monoisotopic_mass: mz - 1.007_276_466_812,
            charge: 1,
            intensity: 5.0,
        };
        let mut envelopes = query.scan.envelopes().to_vec();
        envelopes.push(oxonium(204.0872));
        query.scan = DeconvolutedScan::new(envelopes.clone(), 200.0, 2);
        let expected = unfiltered.localize_spectrum(&query).unwrap();
        assert_eq!(expected.len(), 1);
        assert_eq!(localizer.localize_spectrum(&query).unwrap(), expected);

        // NeuAc oxonium ions rule out the only matching box, which has no NeuAc
        envelopes.push(oxonium(274.0927));
        query.scan = DeconvolutedScan::new(envelopes, 200.0, 2);
        assert!(localizer.localize_spectrum(&query).unwrap().is_empty());
        assert_eq!(localizer.localize_candidate(&query, 0).unwrap(), None);
        assert_eq!(unfiltered.localize_spectrum(&query).unwrap().len(), 1);
    }

    #[test]
    fn absolute_precursor_tolerances() {
        let settings = LocalizationSettings {
            precursor_tolerance: Tolerance::Absolute(0.5),
            ..settings()
        };
        let localizer = Localizer::new(&DB, settings).unwrap();
        let candidate = PeptideCandidate::new(PEPTIDE_MASS, vec![3, 6], ladder());
        let mut matched = Vec::new();
        localizer.matching_boxes(true_precursor_mass() + 0.4, &candidate, &mut matched);
        assert_eq!(matched.len(), 1);
        localizer.matching_boxes(true_precursor_mass() + 0.6, &candidate, &mut matched);
        assert!(matched.is_empty());
    }
}
