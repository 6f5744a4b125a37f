//! MAP-Elites: random seeding, then isotropic mutation of archive elites.

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::archive::FeatureMap;
use crate::schema::{MapConfig, MapElitesConfig};
use crate::search::candidate::Candidate;
use crate::search::{SearchAlgorithm, SearchError};

/// The classic MAP-Elites loop.
///
/// The first `initial_population` candidates are drawn uniformly from
/// `[-1, 1)` per parameter to seed the archive; after that, every candidate
/// is a random elite perturbed by isotropic Gaussian noise. The algorithm
/// blocks between dispatching the last seed candidate and seeing the whole
/// seed population evaluated, which both bounds the in-flight seeds and
/// guarantees a non-empty archive before any elite is sampled.
pub struct MapElites {
    num_params: usize,
    num_to_evaluate: usize,
    initial_population: usize,
    mutation_power: f64,
    individuals_dispatched: usize,
    individuals_evaluated: usize,
    map: FeatureMap,
    rng: Pcg64,
}

impl MapElites {
    /// Builds the algorithm and its empty archive.
    pub fn new(
        num_params: usize,
        num_to_evaluate: usize,
        config: &MapElitesConfig,
        map_config: &MapConfig,
        seed: u64,
    ) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let map = FeatureMap::new(map_config, num_to_evaluate, rng.r#gen());
        Self {
            num_params,
            num_to_evaluate,
            initial_population: config.initial_population,
            mutation_power: config.mutation_power,
            individuals_dispatched: 0,
            individuals_evaluated: 0,
            map,
            rng,
        }
    }
}

impl SearchAlgorithm for MapElites {
    fn is_running(&self) -> bool {
        self.individuals_evaluated < self.num_to_evaluate
    }

    fn is_blocking(&self) -> bool {
        self.individuals_dispatched >= self.initial_population
            && self.individuals_evaluated < self.initial_population
    }

    fn generate(&mut self) -> Option<Candidate> {
        if self.individuals_dispatched < self.initial_population {
            self.individuals_dispatched += 1;
            let params = (0..self.num_params)
                .map(|_| self.rng.gen_range(-1.0..1.0))
                .collect();
            return Some(Candidate::new(params));
        }
        if self.is_blocking() {
            return None;
        }

        let parent = match self.map.random_elite() {
            Ok(elite) => elite.params.clone(),
            Err(error) => {
                log::warn!("cannot mutate an archive elite: {}", error);
                return None;
            }
        };
        self.individuals_dispatched += 1;

        let params = parent
            .iter()
            .map(|&value| value + self.mutation_power * self.rng.sample::<f64, _>(StandardNormal))
            .collect();
        Some(Candidate::new(params))
    }

    fn return_evaluated(&mut self, mut candidate: Candidate) -> Result<Candidate, SearchError> {
        candidate.id = self.individuals_evaluated as u64;
        self.individuals_evaluated += 1;

        self.map.resolve_features(&mut candidate)?;
        self.map.add(candidate.clone());
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
    use crate::schema::{FeatureConfig, MapKind, ObjectiveKind};

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

    fn algorithm(budget: usize, initial: usize) -> MapElites {
        let config = MapElitesConfig {
            initial_population: initial,
            mutation_power: 0.5,
        };
        MapElites::new(6, budget, &config, &map_config(), 17)
    }

    #[test]
    fn test_blocks_only_between_seed_dispatch_and_seed_evaluation() {
        let mut algorithm = algorithm(100, 3);
        assert!(!algorithm.is_blocking());

        let seeds: Vec<Candidate> = (0..3).map(|_| algorithm.generate().unwrap()).collect();
        assert!(algorithm.is_blocking());
        assert!(algorithm.generate().is_none());

        let domain = BenchmarkDomain::new(ObjectiveKind::Sphere, 6);
        for (index, mut seed) in seeds.into_iter().enumerate() {
            domain.evaluate(&mut seed);
            algorithm.return_evaluated(seed).unwrap();
            // Still blocking until the final seed comes back.
            assert_eq!(algorithm.is_blocking(), index < 2);
        }
        assert!(algorithm.generate().is_some());
    }

    #[test]
    fn test_seed_candidates_stay_inside_the_unit_box() {
        let mut algorithm = algorithm(100, 20);
        for _ in 0..20 {
            let candidate = algorithm.generate().unwrap();
            assert!(candidate.params.iter().all(|p| (-1.0..1.0).contains(p)));
        }
    }

    #[test]
    fn test_fills_an_archive_on_the_sphere_benchmark() {
        let mut algorithm = algorithm(500, 40);
        let domain = BenchmarkDomain::new(ObjectiveKind::Sphere, 6);

        while algorithm.is_running() {
            let Some(mut candidate) = algorithm.generate() else {
                break;
            };
            domain.evaluate(&mut candidate);
            algorithm.return_evaluated(candidate).unwrap();
        }

        let map = algorithm.archive().unwrap();
        assert!(map.cells_occupied() > 1);
        let qd: f64 = map.elites().map(|elite| elite.norm_fitness).sum();
        assert!(qd > 0.0);
        assert!(!algorithm.is_running());
        assert_eq!(algorithm.individuals_evaluated, 500);
    }

    #[test]
    fn test_missing_feature_stat_is_a_loud_error() {
        let mut algorithm = algorithm(100, 1);
        let mut candidate = algorithm.generate().unwrap();
        candidate.fitness = 1.0;
        // No stats recorded at all.
        let err = algorithm.return_evaluated(candidate).unwrap_err();
        assert!(matches!(err, SearchError::UnknownFeature(_)));
    }
}
