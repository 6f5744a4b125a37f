//! CMA-ME: a pool of emitters filling a shared feature-map archive.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::archive::FeatureMap;
use crate::schema::{CmaMeConfig, MapConfig};
use crate::search::candidate::Candidate;
use crate::search::emitter::Emitter;
use crate::search::{SearchAlgorithm, SearchError};

/// The CMA-ME scheduler.
///
/// Owns the archive and a pool of [`Emitter`]s. Generation requests go to
/// the non-blocking emitter with the fewest candidates in flight, which
/// keeps slow evaluations from starving any single emitter. Returned
/// candidates get their global identifier and feature coordinates here, are
/// offered to the archive exactly once, and the outcome is forwarded to the
/// emitter that produced them.
pub struct CmaMe {
    num_to_evaluate: usize,
    individuals_evaluated: usize,
    emitters: Vec<Emitter>,
    map: FeatureMap,
}

impl CmaMe {
    /// Builds the archive and expands the emitter definitions into a pool.
    pub fn new(
        num_params: usize,
        num_to_evaluate: usize,
        config: &CmaMeConfig,
        map_config: &MapConfig,
        seed: u64,
    ) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let map = FeatureMap::new(map_config, num_to_evaluate, rng.r#gen());

        let num_features = map_config.features.len();
        let mut emitters = Vec::new();
        for entry in &config.emitters {
            for _ in 0..entry.count {
                emitters.push(Emitter::new(entry, num_params, num_features, rng.r#gen()));
            }
        }

        Self {
            num_to_evaluate,
            individuals_evaluated: 0,
            emitters,
            map,
        }
    }

    /// The emitter pool, in scheduling order.
    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }
}

impl SearchAlgorithm for CmaMe {
    fn is_running(&self) -> bool {
        self.individuals_evaluated < self.num_to_evaluate
    }

    fn is_blocking(&self) -> bool {
        self.emitters.iter().all(Emitter::is_blocking)
    }

    fn generate(&mut self) -> Option<Candidate> {
        // Fewest in flight wins; ties go to the lowest index.
        let index = self
            .emitters
            .iter()
            .enumerate()
            .filter(|(_, emitter)| !emitter.is_blocking())
            .min_by_key(|(_, emitter)| emitter.released())
            .map(|(index, _)| index)?;

        let mut candidate = self.emitters[index].generate();
        candidate.emitter = Some(index);
        Some(candidate)
    }

    fn return_evaluated(&mut self, mut candidate: Candidate) -> Result<Candidate, SearchError> {
        candidate.id = self.individuals_evaluated as u64;
        self.individuals_evaluated += 1;

        self.map.resolve_features(&mut candidate)?;

        let outcome = self.map.add(candidate.clone());
        if let Some(index) = candidate.emitter
            && let Some(emitter) = self.emitters.get_mut(index)
        {
            emitter.return_evaluated(candidate.clone(), outcome, &mut self.map);
        }
        Ok(candidate)
    }

    fn archive(&self) -> Option<&FeatureMap> {
        Some(&self.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::BenchmarkDomain;
    use crate::schema::{EmitterConfig, EmitterKind, FeatureConfig, MapKind, ObjectiveKind};

    fn map_config() -> MapConfig {
        MapConfig {
            kind: MapKind::Fixed,
            start_size: 10,
            end_size: 10,
            features: vec![
                FeatureConfig {
                    name: "FirstHalfSum".into(),
                    min_value: -15.0,
                    max_value: 15.0,
                },
                FeatureConfig {
                    name: "SecondHalfSum".into(),
                    min_value: -15.0,
                    max_value: 15.0,
                },
            ],
        }
    }

    fn two_emitter_config(population_size: usize) -> CmaMeConfig {
        CmaMeConfig {
            emitters: vec![EmitterConfig {
                kind: EmitterKind::Improvement,
                count: 2,
                population_size,
                mutation_power: 0.5,
                overflow_factor: 1.0,
                num_parents: None,
            }],
        }
    }

    #[test]
    fn test_scheduling_prefers_the_least_loaded_emitter() {
        let mut algorithm = CmaMe::new(4, 1000, &two_emitter_config(4), &map_config(), 41);

        // With everything idle the tie breaks to emitter zero, and each
        // in-flight candidate pushes the next draw to the other emitter.
        let owners: Vec<Option<usize>> = (0..4)
            .map(|_| algorithm.generate().and_then(|c| c.emitter))
            .collect();
        assert_eq!(owners, vec![Some(0), Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn test_saturated_emitters_block_the_scheduler() {
        let mut algorithm = CmaMe::new(4, 1000, &two_emitter_config(4), &map_config(), 43);
        let domain = BenchmarkDomain::new(ObjectiveKind::Sphere, 4);

        // Two emitters with populations of four saturate after eight.
        let mut in_flight = Vec::new();
        for _ in 0..8 {
            assert!(!algorithm.is_blocking());
            in_flight.push(algorithm.generate().unwrap());
        }
        assert!(algorithm.is_blocking());
        assert!(algorithm.generate().is_none());

        // One return frees exactly one emitter.
        let mut first = in_flight.remove(0);
        domain.evaluate(&mut first);
        let owner = first.emitter;
        algorithm.return_evaluated(first).unwrap();
        assert!(!algorithm.is_blocking());
        let next = algorithm.generate().unwrap();
        assert_eq!(next.emitter, owner);
    }

    #[test]
    fn test_identifiers_are_assigned_in_return_order() {
        let mut algorithm = CmaMe::new(4, 1000, &two_emitter_config(4), &map_config(), 47);
        let domain = BenchmarkDomain::new(ObjectiveKind::Sphere, 4);

        let mut batch: Vec<Candidate> = (0..6).map(|_| algorithm.generate().unwrap()).collect();
        // Return out of generation order; ids still count returns.
        batch.reverse();
        for (expected, mut candidate) in batch.into_iter().enumerate() {
            domain.evaluate(&mut candidate);
            let finalized = algorithm.return_evaluated(candidate).unwrap();
            assert_eq!(finalized.id, expected as u64);
            assert_eq!(finalized.features.len(), 2);
        }
    }

    #[test]
    fn test_unknown_feature_names_fail_loudly() {
        let mut algorithm = CmaMe::new(4, 1000, &two_emitter_config(4), &map_config(), 53);
        let mut candidate = algorithm.generate().unwrap();
        candidate.fitness = 1.0;
        candidate.record_stat("FirstHalfSum", 0.0);
        // SecondHalfSum never recorded.
        let err = algorithm.return_evaluated(candidate).unwrap_err();
        assert!(matches!(err, SearchError::UnknownFeature(name) if name == "SecondHalfSum"));
    }

    #[test]
    fn test_a_full_run_fills_the_archive() {
        let mut algorithm = CmaMe::new(6, 600, &two_emitter_config(8), &map_config(), 59);
        let domain = BenchmarkDomain::new(ObjectiveKind::Sphere, 6);

        while algorithm.is_running() {
            let Some(mut candidate) = algorithm.generate() else {
                break;
            };
            domain.evaluate(&mut candidate);
            algorithm.return_evaluated(candidate).unwrap();
        }

        assert!(!algorithm.is_running());
        let map = algorithm.archive().unwrap();
        assert!(map.cells_occupied() > 1);
        assert!(map.best_elite().is_some());
    }
}
