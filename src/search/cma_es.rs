//! Plain CMA-ES, the archive-free baseline.

use crate::archive::FeatureMap;
use crate::schema::CmaEsConfig;
use crate::search::candidate::Candidate;
use crate::search::strategy::EvolutionStrategy;
use crate::search::{SearchAlgorithm, SearchError};

/// Classic covariance matrix adaptation over a single distribution.
///
/// Candidates are ranked purely by fitness, generation is never gated on
/// outstanding evaluations, and the archive accessor reports nothing.
pub struct CmaEs {
    num_to_evaluate: usize,
    individuals_evaluated: usize,
    strategy: EvolutionStrategy,
}

impl CmaEs {
    /// Builds the strategy from its configuration.
    pub fn new(num_params: usize, num_to_evaluate: usize, config: &CmaEsConfig, seed: u64) -> Self {
        Self {
            num_to_evaluate,
            individuals_evaluated: 0,
            strategy: EvolutionStrategy::new(
                num_params,
                config.population_size,
                config.num_elites,
                config.mutation_power,
                seed,
            ),
        }
    }

    /// Number of degenerate restarts so far.
    pub fn restarts(&self) -> usize {
        self.strategy.restarts()
    }
}

impl SearchAlgorithm for CmaEs {
    fn is_running(&self) -> bool {
        self.individuals_evaluated < self.num_to_evaluate
    }

    fn is_blocking(&self) -> bool {
        false
    }

    fn generate(&mut self) -> Option<Candidate> {
        let mut candidate = Candidate::new(self.strategy.sample());
        candidate.generation = self.strategy.generations();
        Some(candidate)
    }

    fn return_evaluated(&mut self, mut candidate: Candidate) -> Result<Candidate, SearchError> {
        candidate.id = self.individuals_evaluated as u64;
        self.individuals_evaluated += 1;
        self.strategy.return_evaluated(candidate.clone());
        Ok(candidate)
    }

    fn archive(&self) -> Option<&FeatureMap> {
        None
    }
}
