// External Crate Imports
use glycochem::GlycanId;
use serde::Serialize;
use tracing::trace;

// Local Crate Imports
use crate::{LocalizationGraph, RandomMatchModel};

// Public API ==========================================================================================================

/// A single glycan placed on a single candidate site
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub struct SiteAssignment {
    pub site: usize,
    pub glycan: GlycanId,
    /// Whether any fragments directly support this placement
    pub has_local_peak: bool,
}

/// One complete assignment of a glycan box to the candidate sites of a peptide
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Route {
    assignments: Vec<SiteAssignment>,
    score: f64,
    reverse_p: f64,
}

impl Route {
    #[must_use]
    pub const fn new(assignments: Vec<SiteAssignment>, score: f64) -> Self {
        Self {
            assignments,
            score,
            reverse_p: 1.0,
        }
    }

    #[must_use]
    pub fn with_reverse_p(mut self, reverse_p: f64) -> Self {
        self.reverse_p = reverse_p;
        self
    }

    /// Placements in ascending order of site
    #[must_use]
    pub fn assignments(&self) -> &[SiteAssignment] {
        &self.assignments
    }

    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// How much less likely this route's score is to be reached by chance, used to weigh it against other routes
    #[must_use]
    pub const fn reverse_p(&self) -> f64 {
        self.reverse_p
    }

    #[must_use]
    pub fn places(&self, site: usize, glycan: GlycanId) -> bool {
        self.assignments
            .iter()
            .any(|a| a.site == site && a.glycan == glycan)
    }
}

/// Paths are read back from the last row of a [`LocalizationGraph`] and hold one column (child box index) per row
impl LocalizationGraph<'_> {
    /// The highest scoring path, breaking ties by always taking the first best source
    #[must_use]
    pub fn first_path(&self) -> Vec<usize> {
        let rows = self.rows();
        let mut path = vec![0; rows];
        path[rows - 1] = self.columns() - 1;
        for row in (1..rows).rev() {
            path[row - 1] = self
                .sources(row, path[row], Sources::Best)
                .first()
                .copied()
                .unwrap_or_default();
        }
        path
    }

    /// Every path whose cost matches the best path exactly
    #[must_use]
    pub fn co_optimal_paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        self.walk_paths(Sources::Best, |path| paths.push(path.to_vec()));
        trace!(paths = paths.len(), "found co-optimal paths");
        paths
    }

    /// Every path from the first row to the full box in the last row
    #[must_use]
    pub fn feasible_paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        self.for_each_feasible_path(|path| paths.push(path.to_vec()));
        paths
    }

    /// Like [`LocalizationGraph::feasible_paths`], but without collecting paths that might number in the millions
    pub fn for_each_feasible_path(&self, visit: impl FnMut(&[usize])) {
        self.walk_paths(Sources::All, visit);
    }

    /// Converts a path into the glycan placements it describes
    ///
    /// A glycan is placed wherever the path moves to a bigger child box. The route's score is the sum of the local
    /// costs along the path, plus the graph's unlocalized cost.
    ///
    /// `path` must hold one column per row, as the paths from [`LocalizationGraph::first_path`] and friends do.
    /// Shorter paths panic.
    #[must_use]
    pub fn route(&self, path: &[usize]) -> Route {
        debug_assert_eq!(path.len(), self.rows(), "a path needs one column per row");
        let sites = self.sites();
        let children = self.children();
        let first_glycan = |column: usize| children[column].ids().first().copied();
        let mut assignments = Vec::with_capacity(self.glycan_box().number_of_mods());

        if self.rows() == 1 {
            if let Some(glycan) = first_glycan(path[0]) {
                assignments.push(SiteAssignment {
                    site: sites[0],
                    glycan,
                    has_local_peak: self.total_score() > 0.0,
                });
            }
        } else {
            if let Some(glycan) = first_glycan(path[0]) {
                assignments.push(SiteAssignment {
                    site: sites[0],
                    glycan,
                    has_local_peak: self.local_cost(0, path[0]) > 0.0,
                });
            }

            let last_row = path.len() - 1;
            for row in 1..path.len() {
                let (previous, current) = (path[row - 1], path[row]);
                if previous == current {
                    continue;
                }

                let placed = children[current].difference(&children[previous]);
                debug_assert_eq!(placed.len(), 1, "each step may place only a single glycan");
                let Some(&glycan) = placed.first() else {
                    continue;
                };

                // Evidence both before and after the site is needed, unless this is the last site
                let has_local_peak = self.local_cost(row - 1, previous) > 0.0
                    && (self.local_cost(row, current) > 0.0 || row == last_row);
                assignments.push(SiteAssignment {
                    site: sites[row],
                    glycan,
                    has_local_peak,
                });
            }
        }

        let local_score: f64 = path
            .iter()
            .enumerate()
            .map(|(row, &column)| self.local_cost(row, column))
            .sum();
        Route::new(assignments, local_score + self.unlocalized_cost())
    }

    #[must_use]
    pub fn best_route(&self) -> Route {
        self.route(&self.first_path())
    }

    #[must_use]
    pub fn co_optimal_routes(&self) -> Vec<Route> {
        self.co_optimal_paths()
            .iter()
            .map(|path| self.route(path))
            .collect()
    }

    /// Every feasible route, each weighted by the reverse-P of its score under `model`
    #[must_use]
    pub fn feasible_routes(&self, model: &RandomMatchModel) -> Vec<Route> {
        let mut routes = Vec::new();
        self.for_each_feasible_path(|path| {
            let route = self.route(path);
            let reverse_p = model.reverse_p(route.score());
            routes.push(route.with_reverse_p(reverse_p));
        });
        trace!(routes = routes.len(), "found feasible routes");
        routes
    }

    fn sources(&self, row: usize, column: usize, sources: Sources) -> &[usize] {
        let Some(cell) = self.cell(row, column) else {
            return &[];
        };
        match sources {
            Sources::Best => cell.best_sources(),
            Sources::All => cell.all_sources(),
        }
    }

    // Depth-first, with an explicit stack, visiting paths in the order their sources are listed
    fn walk_paths(&self, sources: Sources, mut visit: impl FnMut(&[usize])) {
        let rows = self.rows();
        let mut path = vec![0; rows];
        let mut stack = vec![(rows - 1, self.columns() - 1)];

        while let Some((row, column)) = stack.pop() {
            path[row] = column;
            if row == 0 {
                visit(&path);
                continue;
            }

            let previous = self.sources(row, column, sources);
            stack.extend(previous.iter().rev().map(|&source| (row - 1, source)));
        }
    }
}

// Private Types =======================================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Sources {
    Best,
    All,
}

// Module Tests ========================================================================================================
