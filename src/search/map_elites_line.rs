//! MAP-Elites with the directional "line" mutation between two elites.

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::archive::FeatureMap;
use crate::schema::{MapConfig, MapElitesLineConfig};
use crate::search::candidate::Candidate;
use crate::search::{SearchAlgorithm, SearchError};

/// MAP-Elites whose mutation follows the line between two parents.
///
/// Seeding and blocking match [`MapElites`](crate::search::MapElites); the
/// difference is the variation operator. Each child starts from one random
/// elite, takes isotropic noise per parameter, and adds a displacement along
/// the vector to a second random elite, scaled by a single shared normal
/// draw. High-performing regions of many objectives form hyperplanes, and
/// the directional component lets the search travel along them far faster
/// than isotropic noise alone.
pub struct MapElitesLine {
    num_params: usize,
    num_to_evaluate: usize,
    initial_population: usize,
    mutation_power: f64,
    mutation_power_2: f64,
    individuals_dispatched: usize,
    individuals_evaluated: usize,
    map: FeatureMap,
    rng: Pcg64,
}

impl MapElitesLine {
    /// Builds the algorithm and its empty archive.
    pub fn new(
        num_params: usize,
        num_to_evaluate: usize,
        config: &MapElitesLineConfig,
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
            mutation_power_2: config.mutation_power_2,
            individuals_dispatched: 0,
            individuals_evaluated: 0,
            map,
            rng,
        }
    }
}

impl SearchAlgorithm for MapElitesLine {
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

        // The two parents are drawn independently and may coincide, in which
        // case the line component vanishes.
        let first = match self.map.random_elite() {
            Ok(elite) => elite.params.clone(),
            Err(error) => {
                log::warn!("cannot mutate an archive elite: {}", error);
                return None;
            }
        };
        let second = match self.map.random_elite() {
            Ok(elite) => elite.params.clone(),
            Err(error) => {
                log::warn!("cannot mutate an archive elite: {}", error);
                return None;
            }
        };
        self.individuals_dispatched += 1;

        let line_scale = self.mutation_power_2 * self.rng.sample::<f64, _>(StandardNormal);
        let params = first
            .iter()
            .zip(second.iter())
            .map(|(&a, &b)| {
                a + self.mutation_power * self.rng.sample::<f64, _>(StandardNormal)
                    + line_scale * (b - a)
            })
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
            start_size: 8,
            end_size: 8,
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

    #[test]
    fn test_runs_a_full_budget_on_the_sphere_benchmark() {
        let config = MapElitesLineConfig {
            initial_population: 30,
            mutation_power: 0.3,
            mutation_power_2: 0.2,
        };
        let mut algorithm = MapElitesLine::new(6, 400, &config, &map_config(), 23);
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
        assert!(!algorithm.is_running());
    }

    #[test]
    fn test_line_mutation_interpolates_when_noise_is_tiny() {
        let config = MapElitesLineConfig {
            initial_population: 2,
            mutation_power: 1e-12,
            mutation_power_2: 0.5,
        };
        let mut algorithm = MapElitesLine::new(4, 100, &config, &map_config(), 31);

        // Evaluate the two seeds into different cells so the archive holds
        // two distant parents.
        for fitness in [1.0, 2.0] {
            let mut seed = algorithm.generate().unwrap();
            seed.fitness = fitness;
            seed.record_stat("FirstHalfSum", fitness * 10.0);
            seed.record_stat("SecondHalfSum", fitness * -10.0);
            algorithm.return_evaluated(seed).unwrap();
        }
        assert_eq!(algorithm.map.cells_occupied(), 2);

        // With isotropic noise suppressed, every child lies on the line
        // through its two parents: child = a + t * (b - a) for one scalar t.
        for _ in 0..10 {
            let child = algorithm.generate().unwrap();
            let elites: Vec<&Candidate> = algorithm.map.elites().collect();
            let on_a_line = elites.iter().any(|a| {
                elites.iter().any(|b| {
                    let t = estimated_scale(&a.params, &b.params, &child.params);
                    child
                        .params
                        .iter()
                        .zip(a.params.iter().zip(b.params.iter()))
                        .all(|(&c, (&pa, &pb))| (c - (pa + t * (pb - pa))).abs() < 1e-6)
                })
            });
            assert!(on_a_line);
        }
    }

    /// Least-squares estimate of the line-mutation scalar from one child.
    fn estimated_scale(a: &[f64], b: &[f64], child: &[f64]) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for ((&pa, &pb), &c) in a.iter().zip(b.iter()).zip(child.iter()) {
            let direction = pb - pa;
            numerator += (c - pa) * direction;
            denominator += direction * direction;
        }
        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }
}
