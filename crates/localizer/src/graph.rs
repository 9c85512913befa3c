// External Crate Imports
use glycochem::GlycanBox;
use serde::Serialize;
use tracing::trace;

// Local Crate Imports
use crate::{LocalEvidence, LocalizationError, Result};

// Public API ==========================================================================================================

/// One reachable state of a [`LocalizationGraph`]: the glycans of a child box have been placed on the sites up to and
/// including this cell's row
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Cell {
    local_cost: f64,
    max_cost: f64,
    best_sources: Vec<usize>,
    all_sources: Vec<usize>,
}

impl Cell {
    #[must_use]
    pub const fn local_cost(&self) -> f64 {
        self.local_cost
    }

    /// The best cumulative cost of any path from the first row that ends at this cell
    #[must_use]
    pub const fn max_cost(&self) -> f64 {
        self.max_cost
    }

    /// Columns of the previous row whose paths reach this cell with its [`Cell::max_cost`]
    #[must_use]
    pub fn best_sources(&self) -> &[usize] {
        &self.best_sources
    }

    /// Every column of the previous row that this cell can be reached from
    #[must_use]
    pub fn all_sources(&self) -> &[usize] {
        &self.all_sources
    }

    const fn first_row(local_cost: f64) -> Self {
        Self {
            local_cost,
            max_cost: local_cost,
            best_sources: Vec::new(),
            all_sources: Vec::new(),
        }
    }

    fn linked(local_cost: f64, previous_row: &[Option<Self>], links: &[bool]) -> Option<Self> {
        let mut max_cost = f64::NEG_INFINITY;
        let mut best_sources = Vec::new();
        let mut all_sources = Vec::new();

        for (source, (cell, &linked)) in previous_row.iter().zip(links).enumerate() {
            let (true, Some(cell)) = (linked, cell) else {
                continue;
            };
            all_sources.push(source);

            // NOTE: Ties are exact, so a path is only co-optimal if it scores bit-for-bit the same
            let cost = local_cost + cell.max_cost;
            if cost > max_cost {
                max_cost = cost;
                best_sources.clear();
                best_sources.push(source);
            } else if cost == max_cost {
                best_sources.push(source);
            }
        }

        (!all_sources.is_empty()).then_some(Self {
            local_cost,
            max_cost,
            best_sources,
            all_sources,
        })
    }
}

/// A dynamic program over every way of distributing a glycan box across the candidate sites of a peptide
///
/// Rows are candidate sites (in ascending order) and columns are child boxes. Walking down the rows, each step either
/// keeps the same child box (nothing is placed on that site) or moves to a child box holding exactly one more glycan
/// (that glycan is placed on that site). Every path from the first row to the full box in the last row is therefore one
/// complete assignment of glycans to sites.
#[derive(Clone, Debug)]
pub struct LocalizationGraph<'g> {
    sites: &'g [usize],
    glycan_box: &'g GlycanBox,
    children: &'g [GlycanBox],
    cells: Vec<Option<Cell>>,
    unlocalized_cost: f64,
    total_score: f64,
}

impl<'g> LocalizationGraph<'g> {
    /// Scores every reachable cell with `evidence`, then links each to its best predecessors
    ///
    /// `children` must be the child boxes of `glycan_box`, ordered by size and ending with the full box, as
    /// [`glycochem::build_child_boxes`] returns them. `sites` must be sorted in ascending order.
    pub fn build(
        sites: &'g [usize],
        glycan_box: &'g GlycanBox,
        children: &'g [GlycanBox],
        evidence: &impl LocalEvidence,
    ) -> Result<Self> {
        let rows = sites.len();
        let columns = children.len();
        let glycans = glycan_box.number_of_mods();

        if rows == 0 {
            return Err(LocalizationError::NoSites);
        }
        if glycans > rows {
            return Err(LocalizationError::TooFewSites {
                sites: rows,
                glycans,
            });
        }
        if children
            .last()
            .is_none_or(|full| full.ids() != glycan_box.ids())
        {
            return Err(LocalizationError::MissingChildBoxes);
        }
        debug_assert!(sites.is_sorted(), "candidate sites must be sorted");

        let links = child_links(children);
        let mut cells = Vec::with_capacity(rows * columns);
        for row in 0..rows {
            // There must be enough sites left for the glycans that haven't been placed yet
            let fewest_mods = glycans.saturating_sub(rows - 1 - row);
            let most_mods = row + 1;

            for (column, child) in children.iter().enumerate() {
                let mods = child.number_of_mods();
                let cell = if (fewest_mods..=most_mods).contains(&mods) {
                    let local_cost = if row == rows - 1 {
                        0.0
                    } else {
                        evidence.local_cost(row, child)
                    };

                    if row == 0 {
                        Some(Cell::first_row(local_cost))
                    } else {
                        let previous_row = &cells[(row - 1) * columns..row * columns];
                        let column_links = &links[column * columns..=column * columns + column];
                        Cell::linked(local_cost, previous_row, column_links)
                    }
                } else {
                    None
                };
                cells.push(cell);
            }
        }

        let unlocalized_cost = evidence.unlocalized_cost();
        let final_cost = cells
            .last()
            .and_then(Option::as_ref)
            .map(Cell::max_cost)
            .ok_or(LocalizationError::MissingChildBoxes)?;
        let total_score = final_cost + unlocalized_cost;

        trace!(
            sites = rows,
            children = columns,
            reachable = cells.iter().flatten().count(),
            total_score,
            "built localization graph"
        );

        Ok(Self {
            sites,
            glycan_box,
            children,
            cells,
            unlocalized_cost,
            total_score,
        })
    }

    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        if row >= self.rows() || column >= self.columns() {
            return None;
        }
        self.cells[row * self.columns() + column].as_ref()
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub const fn columns(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub const fn sites(&self) -> &'g [usize] {
        self.sites
    }

    #[must_use]
    pub const fn glycan_box(&self) -> &'g GlycanBox {
        self.glycan_box
    }

    #[must_use]
    pub const fn children(&self) -> &'g [GlycanBox] {
        self.children
    }

    #[must_use]
    pub const fn unlocalized_cost(&self) -> f64 {
        self.unlocalized_cost
    }

    /// The best path cost through the graph, plus the cost of the fragments that don't depend on localization
    #[must_use]
    pub const fn total_score(&self) -> f64 {
        self.total_score
    }

    pub(crate) fn local_cost(&self, row: usize, column: usize) -> f64 {
        self.cell(row, column).map_or(0.0, Cell::local_cost)
    }
}

// Private Helper Functions ============================================================================================

// A row-major `children × children` table, where `(column, source)` is `true` if the child box in `column` can follow
// the child box in `source`: it either is that box, or holds exactly one more glycan than it
fn child_links(children: &[GlycanBox]) -> Vec<bool> {
    let columns = children.len();
    let mut links = vec![false; columns * columns];
    for (column, child) in children.iter().enumerate() {
        for (source, previous) in children[..=column].iter().enumerate() {
            let (mods, previous_mods) = (child.number_of_mods(), previous.number_of_mods());
            links[column * columns + source] =
                mods <= previous_mods + 1 && (previous_mods == 0 || child.contains(previous));
        }
    }
    links
}

// Module Tests ========================================================================================================
