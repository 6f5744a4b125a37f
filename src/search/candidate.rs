//! A single sampled solution and everything the evaluator learned about it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::search::SearchError;

/// One point in parameter space, carried from sampling through evaluation and
/// back into the search algorithm.
///
/// A candidate starts life with only `params` filled in. The evaluator sets
/// `fitness`, `norm_fitness`, and `stats`; the search algorithm assigns `id`
/// and resolves `features` from the named stats when the candidate is
/// returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Global identifier, assigned in return order starting at zero.
    pub id: u64,
    /// Index of the emitter that produced this candidate, if any.
    pub emitter: Option<usize>,
    /// Generation counter of the producing strategy at sampling time.
    pub generation: usize,
    /// The parameter vector being optimized.
    pub params: Vec<f64>,
    /// Raw objective value, higher is better.
    pub fitness: f64,
    /// Objective value rescaled to `[0, 1]` for archive statistics.
    pub norm_fitness: f64,
    /// Behavioral coordinates, resolved from `stats` on return.
    pub features: Vec<f64>,
    /// Named scalar measurements recorded during evaluation.
    pub stats: BTreeMap<String, f64>,
}

impl Candidate {
    /// Creates an unevaluated candidate for the given parameter vector.
    pub fn new(params: Vec<f64>) -> Self {
        Self {
            id: 0,
            emitter: None,
            generation: 0,
            params,
            fitness: f64::NEG_INFINITY,
            norm_fitness: 0.0,
            features: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    /// Records a named stat, overwriting any previous value.
    pub fn record_stat(&mut self, name: impl Into<String>, value: f64) {
        self.stats.insert(name.into(), value);
    }

    /// Looks up a named stat, failing when the evaluator never recorded it.
    pub fn stat(&self, name: &str) -> Result<f64, SearchError> {
        self.stats
            .get(name)
            .copied()
            .ok_or_else(|| SearchError::UnknownFeature(name.to_owned()))
    }
}
