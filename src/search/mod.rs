//! Search module - Quality-diversity and evolution-strategy algorithms.
//!
//! ## Overview
//!
//! Every algorithm here speaks the same ask/tell protocol: the driver asks
//! for candidates with [`SearchAlgorithm::generate`], evaluates them however
//! it likes, and hands them back through
//! [`SearchAlgorithm::return_evaluated`]. Algorithms never call the
//! evaluator, so the driver is free to batch and parallelize evaluations.
//!
//! Four algorithms implement the protocol:
//!
//! * [`CmaEs`] - classic covariance matrix adaptation, no archive.
//! * [`CmaMe`] - a scheduler over CMA-ES [`Emitter`]s that fill a shared
//!   feature-map archive.
//! * [`MapElites`] - uniform random seeding followed by isotropic mutation
//!   of random archive elites.
//! * [`MapElitesLine`] - MAP-Elites with an added mutation component along
//!   the line between two archive elites.

mod candidate;
mod cma_es;
mod cma_me;
mod covariance;
mod emitter;
mod map_elites;
mod map_elites_line;
mod strategy;

pub use candidate::Candidate;
pub use cma_es::CmaEs;
pub use cma_me::CmaMe;
pub use covariance::{CovarianceState, Decomposition};
pub use emitter::Emitter;
pub use map_elites::MapElites;
pub use map_elites_line::MapElitesLine;
pub use strategy::{CmaConstants, EvolutionStrategy};

use crate::archive::FeatureMap;
use crate::schema::{AlgorithmConfig, ExperimentConfig};

/// Errors surfaced while driving a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A configured feature name had no matching stat on the candidate.
    #[error("evaluated candidate has no stat named `{0}`")]
    UnknownFeature(String),
    /// An elite was requested from an archive with no entries.
    #[error("the archive holds no elites yet")]
    EmptyArchive,
}

/// The driver-facing contract shared by every search algorithm.
pub trait SearchAlgorithm {
    /// Whether the evaluation budget still has room.
    fn is_running(&self) -> bool;

    /// Whether the algorithm needs evaluations back before it can usefully
    /// generate more candidates.
    fn is_blocking(&self) -> bool;

    /// Samples the next candidate to evaluate, or `None` when every source
    /// is currently blocked.
    fn generate(&mut self) -> Option<Candidate>;

    /// Accepts an evaluated candidate and returns it finalized, with its
    /// identifier assigned and feature coordinates resolved.
    fn return_evaluated(&mut self, candidate: Candidate) -> Result<Candidate, SearchError>;

    /// The archive, for algorithms that maintain one.
    fn archive(&self) -> Option<&FeatureMap>;
}

/// Builds the search algorithm an experiment configures.
///
/// A missing `random_seed` draws a fresh one, so runs are reproducible
/// whenever the config pins the seed.
pub fn build_algorithm(config: &ExperimentConfig) -> Box<dyn SearchAlgorithm> {
    let seed = config.random_seed.unwrap_or_else(rand::random);
    log::info!("building {} with seed {}", config.algorithm.name(), seed);

    match &config.algorithm {
        AlgorithmConfig::CmaEs(algorithm) => Box::new(CmaEs::new(
            config.num_params,
            config.num_to_evaluate,
            algorithm,
            seed,
        )),
        AlgorithmConfig::CmaMe(algorithm) => Box::new(CmaMe::new(
            config.num_params,
            config.num_to_evaluate,
            algorithm,
            &config.map,
            seed,
        )),
        AlgorithmConfig::MapElites(algorithm) => Box::new(MapElites::new(
            config.num_params,
            config.num_to_evaluate,
            algorithm,
            &config.map,
            seed,
        )),
        AlgorithmConfig::MapElitesLine(algorithm) => Box::new(MapElitesLine::new(
            config.num_params,
            config.num_to_evaluate,
            algorithm,
            &config.map,
            seed,
        )),
    }
}
