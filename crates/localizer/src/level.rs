// External Crate Imports
use derive_more::Display;
use glycochem::GlycanId;
use serde::Serialize;
use tracing::debug;

// Local Crate Imports
use crate::{LocalizationGraph, RandomMatchModel, Route, SiteProbabilities};

// Public API ==========================================================================================================

/// How confidently a glycan box has been localized, from best to worst
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize)]
pub enum LocalizationLevel {
    /// Exactly one route explains the evidence best
    Level1,
    /// Exactly one route explains the evidence best, but not all of its placements are well supported
    Level1b,
    /// Several routes are tied, but they all agree on at least one placement
    Level2,
    /// Several routes are tied, and they share no placements
    Level3,
}

/// A placement taken from at least one of the best routes
#[derive(Copy, Clone, PartialEq, Debug, Serialize)]
pub struct LocalizedGlycan {
    pub site: usize,
    pub glycan: GlycanId,
    /// Every one of the best routes makes this placement
    pub confident: bool,
    /// Only calculated for [`LocalizationLevel::Level1`] and [`LocalizationLevel::Level2`] localizations
    pub probability: Option<f64>,
}

/// The combined localization of one or more equally scoring glycan boxes onto the same peptide
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Localization {
    routes: Vec<Route>,
    localized: Vec<LocalizedGlycan>,
    site_probabilities: Option<SiteProbabilities>,
    level: LocalizationLevel,
    total_score: f64,
}

impl Localization {
    /// Pools the co-optimal routes of every graph and classifies them
    ///
    /// Returns `None` if `graphs` is empty. All graphs are expected to share the same candidate sites.
    #[must_use]
    pub fn new(
        graphs: &[LocalizationGraph<'_>],
        model: &RandomMatchModel,
        min_site_probability: f64,
    ) -> Option<Self> {
        let first_graph = graphs.first()?;
        let routes: Vec<_> = graphs
            .iter()
            .flat_map(LocalizationGraph::co_optimal_routes)
            .collect();
        let best_route = routes.first()?;

        // Count how many of the best routes make each placement, in the order placements are first seen
        let mut placements: Vec<(usize, GlycanId, usize)> = Vec::new();
        for assignment in routes.iter().flat_map(Route::assignments) {
            let (site, glycan) = (assignment.site, assignment.glycan);
            match placements
                .iter_mut()
                .find(|(s, g, _)| *s == site && *g == glycan)
            {
                Some((_, _, count)) => *count += 1,
                None => placements.push((site, glycan, 1)),
            }
        }

        let mut level = if routes.len() == 1 {
            LocalizationLevel::Level1
        } else if placements.iter().any(|&(_, _, count)| count == routes.len()) {
            LocalizationLevel::Level2
        } else {
            LocalizationLevel::Level3
        };

        let site_probabilities = matches!(
            level,
            LocalizationLevel::Level1 | LocalizationLevel::Level2
        )
        .then(|| {
            let feasible: Vec<_> = graphs
                .iter()
                .flat_map(|graph| graph.feasible_routes(model))
                .collect();
            SiteProbabilities::from_routes(&feasible, first_graph.sites())
        });

        let localized: Vec<_> = placements
            .into_iter()
            .map(|(site, glycan, count)| LocalizedGlycan {
                site,
                glycan,
                confident: count == routes.len(),
                probability: site_probabilities
                    .as_ref()
                    .and_then(|p| p.get(site, glycan)),
            })
            .collect();

        if level == LocalizationLevel::Level1 {
            let single_site_without_evidence =
                first_graph.rows() == 1 && first_graph.total_score() == 0.0;
            let weak_placement = best_route.assignments().iter().any(|assignment| {
                let probability = site_probabilities
                    .as_ref()
                    .and_then(|p| p.get(assignment.site, assignment.glycan))
                    .unwrap_or_default();
                probability < min_site_probability || !assignment.has_local_peak
            });
            if single_site_without_evidence || weak_placement {
                level = LocalizationLevel::Level1b;
            }
        }

        let total_score = graphs
            .iter()
            .map(LocalizationGraph::total_score)
            .fold(f64::NEG_INFINITY, f64::max);

        debug!(
            graphs = graphs.len(),
            routes = routes.len(),
            %level,
            total_score,
            "localized glycans"
        );

        Some(Self {
            routes,
            localized,
            site_probabilities,
            level,
            total_score,
        })
    }

    /// The first of the best routes
    #[must_use]
    pub fn best_route(&self) -> &Route {
        // SAFETY: `Localization::new` never builds a `Localization` without at least one route
        &self.routes[0]
    }

    /// Every route tied for the best score, across all of the localized glycan boxes
    #[must_use]
    pub fn co_optimal_routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn localized(&self) -> &[LocalizedGlycan] {
        &self.localized
    }

    #[must_use]
    pub const fn site_probabilities(&self) -> Option<&SiteProbabilities> {
        self.site_probabilities.as_ref()
    }

    #[must_use]
    pub const fn level(&self) -> LocalizationLevel {
        self.level
    }

    #[must_use]
    pub const fn total_score(&self) -> f64 {
        self.total_score
    }
}

// Module Tests ========================================================================================================
