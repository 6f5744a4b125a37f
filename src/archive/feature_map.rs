//! The feature map: one elite candidate per behavioral cell.
//!
//! The map discretizes the configured feature ranges into a uniform grid and
//! keeps, for every cell, the highest-fitness candidate whose feature
//! coordinates landed there. A sliding map grows its resolution over the
//! evaluation budget and re-buckets every elite on each growth step, so early
//! coarse coverage refines into a fine-grained archive without losing its
//! best discoveries.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::archive::sizer::LinearMapSizer;
use crate::schema::{FeatureConfig, MapConfig, MapKind};
use crate::search::{Candidate, SearchError};

/// Discrete cell coordinates, one bin index per feature dimension.
pub type CellKey = Vec<usize>;

/// Result of offering a candidate to the archive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddOutcome {
    /// The candidate filled a previously empty cell.
    NewCell,
    /// The candidate beat the incumbent; carries the fitness gain.
    Improved(f64),
    /// The candidate lost to the incumbent or was not archivable.
    Rejected,
}

impl AddOutcome {
    /// Whether the candidate entered the archive.
    pub fn archived(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// A uniform grid over feature space holding one elite per cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMap {
    kind: MapKind,
    sizer: LinearMapSizer,
    features: Vec<FeatureConfig>,
    resolution: usize,
    total_budget: usize,
    individuals_added: usize,
    #[serde(with = "elite_entries")]
    elites: BTreeMap<CellKey, Candidate>,
    rng: Pcg64,
}

impl FeatureMap {
    /// Creates an empty map for the configured feature space.
    ///
    /// A sliding map starts at the schedule's coarse end; a fixed map keys
    /// every candidate at the schedule's final resolution from the start.
    pub fn new(config: &MapConfig, total_budget: usize, seed: u64) -> Self {
        let sizer = LinearMapSizer::new(config.start_size, config.end_size);
        let resolution = match config.kind {
            MapKind::Fixed => sizer.end_size(),
            MapKind::Sliding => sizer.start_size(),
        };
        Self {
            kind: config.kind,
            sizer,
            features: config.features.clone(),
            resolution,
            total_budget,
            individuals_added: 0,
            elites: BTreeMap::new(),
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// The configured feature dimensions.
    pub fn features(&self) -> &[FeatureConfig] {
        &self.features
    }

    /// Number of feature dimensions.
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Current bins per feature dimension.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Number of occupied cells.
    pub fn cells_occupied(&self) -> usize {
        self.elites.len()
    }

    /// Whether no candidate has been archived yet.
    pub fn is_empty(&self) -> bool {
        self.elites.is_empty()
    }

    /// Total cell count at the current resolution.
    pub fn max_cells(&self) -> f64 {
        (self.resolution as f64).powi(self.features.len() as i32)
    }

    /// Iterates over the archived elites in cell-key order.
    pub fn elites(&self) -> impl Iterator<Item = &Candidate> {
        self.elites.values()
    }

    /// Iterates over occupied cells and their elites in cell-key order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &Candidate)> {
        self.elites.iter()
    }

    /// The highest-fitness elite in the archive.
    pub fn best_elite(&self) -> Option<&Candidate> {
        self.elites
            .values()
            .max_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Maps finite feature coordinates to a cell key at the current
    /// resolution. Out-of-range coordinates clamp to the boundary bins.
    pub fn cell_key_for(&self, features: &[f64]) -> CellKey {
        features
            .iter()
            .zip(self.features.iter())
            .map(|(&value, feature)| {
                let clamped = value.clamp(feature.min_value, feature.max_value);
                let span = feature.max_value - feature.min_value;
                let bin = ((clamped - feature.min_value) / span * self.resolution as f64) as usize;
                bin.min(self.resolution - 1)
            })
            .collect()
    }

    /// Resolves the candidate's feature coordinates from its named stats,
    /// failing on any feature name the evaluator never recorded.
    pub fn resolve_features(&self, candidate: &mut Candidate) -> Result<(), SearchError> {
        candidate.features = self
            .features
            .iter()
            .map(|feature| candidate.stat(&feature.name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    /// Offers a candidate to the archive and reports what happened.
    ///
    /// Every call advances the resolution schedule, whether or not the
    /// candidate is kept. Candidates with non-finite fitness or features are
    /// rejected outright.
    pub fn add(&mut self, candidate: Candidate) -> AddOutcome {
        self.individuals_added += 1;
        if self.kind == MapKind::Sliding {
            let portion = self.individuals_added as f64 / self.total_budget as f64;
            let next = self.sizer.size_at(portion);
            if next != self.resolution {
                self.remap(next);
            }
        }

        if !candidate.fitness.is_finite() || candidate.features.iter().any(|f| !f.is_finite()) {
            log::warn!(
                "rejecting candidate {} with non-finite fitness or features",
                candidate.id
            );
            return AddOutcome::Rejected;
        }

        self.insert(candidate)
    }

    /// Draws an archived elite uniformly at random.
    pub fn random_elite(&mut self) -> Result<&Candidate, SearchError> {
        if self.elites.is_empty() {
            return Err(SearchError::EmptyArchive);
        }
        let index = self.rng.gen_range(0..self.elites.len());
        self.elites
            .values()
            .nth(index)
            .ok_or(SearchError::EmptyArchive)
    }

    fn insert(&mut self, candidate: Candidate) -> AddOutcome {
        let key = self.cell_key_for(&candidate.features);
        match self.elites.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
                AddOutcome::NewCell
            }
            Entry::Occupied(mut slot) => {
                let gain = candidate.fitness - slot.get().fitness;
                if gain > 0.0 {
                    slot.insert(candidate);
                    AddOutcome::Improved(gain)
                } else {
                    AddOutcome::Rejected
                }
            }
        }
    }

    /// Rekeys every elite at a new resolution. Elites that collide in the
    /// coarser or finer grid are resolved by fitness.
    fn remap(&mut self, resolution: usize) {
        log::debug!(
            "remapping archive from {} to {} bins per dimension ({} elites)",
            self.resolution,
            resolution,
            self.elites.len()
        );
        self.resolution = resolution;
        let previous = std::mem::take(&mut self.elites);
        for (_, elite) in previous {
            self.insert(elite);
        }
    }
}

mod elite_entries {
    //! The elite table keyed by `Vec<usize>` cannot serialize as a JSON map,
    //! so it round-trips as a sequence of key/candidate pairs.

    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::CellKey;
    use crate::search::Candidate;

    pub fn serialize<S: Serializer>(
        elites: &BTreeMap<CellKey, Candidate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<(&CellKey, &Candidate)> = elites.iter().collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<CellKey, Candidate>, D::Error> {
        let entries: Vec<(CellKey, Candidate)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
