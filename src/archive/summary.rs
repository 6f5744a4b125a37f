//! Aggregate quality-diversity statistics over the archive.

use std::cmp::Ordering;

use serde::Serialize;

use crate::archive::feature_map::FeatureMap;

/// A point-in-time snapshot of archive quality and coverage.
///
/// All fitness statistics are over the normalized fitness of the archived
/// elites, so runs against different objectives stay comparable.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MapSummary {
    /// Candidates returned to the algorithm so far.
    pub num_evaluated: usize,
    /// Sum of normalized fitness over all occupied cells.
    pub qd_score: f64,
    /// Mean normalized fitness of the occupied cells.
    pub mean_norm_fitness: f64,
    /// Upper median normalized fitness of the occupied cells.
    pub median_norm_fitness: f64,
    /// Number of occupied cells.
    pub cells_occupied: usize,
    /// Occupied cells as a percentage of all cells at the current resolution.
    pub percent_occupied: f64,
    /// Best normalized fitness in the archive.
    pub max_norm_fitness: f64,
}

impl MapSummary {
    /// Computes the summary for the archive's current contents.
    pub fn from_map(map: &FeatureMap, num_evaluated: usize) -> Self {
        let mut norms: Vec<f64> = map.elites().map(|elite| elite.norm_fitness).collect();
        norms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let cells_occupied = norms.len();
        let qd_score: f64 = norms.iter().sum();
        let (mean, median, max) = if cells_occupied == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                qd_score / cells_occupied as f64,
                norms[cells_occupied / 2],
                norms[cells_occupied - 1],
            )
        };
        let percent_occupied = 100.0 * cells_occupied as f64 / map.max_cells();

        Self {
            num_evaluated,
            qd_score,
            mean_norm_fitness: mean,
            median_norm_fitness: median,
            cells_occupied,
            percent_occupied,
            max_norm_fitness: max,
        }
    }
}
