//! Archive-driven CMA-ES emitters.
//!
//! An emitter wraps an [`EvolutionStrategy`] and points it at the archive:
//! candidates are sampled from the strategy, and once a full population has
//! come back evaluated, the emitter ranks it by its own policy and adapts the
//! strategy from that ranking. When the strategy degenerates, or the policy
//! decides the current search region is exhausted, the emitter restarts the
//! strategy around an elite drawn from the archive.
//!
//! An emitter releases at most `population_size * overflow_factor` candidates
//! into flight; past that bound it reports itself blocking until evaluations
//! come back.

use std::cmp::Ordering;

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::archive::{AddOutcome, FeatureMap};
use crate::schema::{EmitterConfig, EmitterKind};
use crate::search::candidate::Candidate;
use crate::search::strategy::EvolutionStrategy;

/// Ranking policy of an emitter, with any policy-owned state.
#[derive(Debug)]
enum Policy {
    /// Ranks archive additions novel-cells-first, then by fitness gain.
    Improvement,
    /// Ranks by raw fitness, recombining a fixed number of parents.
    Optimizing { num_parents: usize },
    /// Ranks archive additions by how far their features travelled along a
    /// direction sampled at the last restart.
    RandomDirection {
        direction: DVector<f64>,
        origin: DVector<f64>,
    },
}

/// One emitter: a policy plus the strategy it steers.
pub struct Emitter {
    policy: Policy,
    strategy: EvolutionStrategy,
    population_size: usize,
    batch_limit: usize,
    released: usize,
    population: Vec<(Candidate, AddOutcome)>,
    restarts: usize,
    rng: Pcg64,
}

impl Emitter {
    /// Builds an emitter from its configuration.
    ///
    /// The strategy's mean starts at the origin; the first restart re-seeds
    /// it from the archive.
    pub fn new(config: &EmitterConfig, num_params: usize, num_features: usize, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);

        let num_elites = match config.kind {
            EmitterKind::Optimizing => config.num_parents,
            _ => None,
        };
        let mut strategy = EvolutionStrategy::new(
            num_params,
            Some(config.population_size),
            num_elites,
            config.mutation_power,
            rng.r#gen(),
        );
        strategy.set_mean(DVector::zeros(num_params));

        let policy = match config.kind {
            EmitterKind::Improvement => Policy::Improvement,
            EmitterKind::Optimizing => Policy::Optimizing {
                num_parents: strategy.num_elites(),
            },
            EmitterKind::RandomDirection => Policy::RandomDirection {
                direction: random_unit_direction(&mut rng, num_features),
                origin: DVector::zeros(num_features),
            },
        };

        let batch_limit = (config.population_size as f64 * config.overflow_factor) as usize;
        Self {
            policy,
            strategy,
            population_size: config.population_size,
            batch_limit,
            released: 0,
            population: Vec::with_capacity(config.population_size),
            restarts: 0,
            rng,
        }
    }

    /// Candidates currently in flight.
    pub fn released(&self) -> usize {
        self.released
    }

    /// Times this emitter has restarted its strategy.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Whether the in-flight batch has reached its bound.
    pub fn is_blocking(&self) -> bool {
        self.released >= self.batch_limit
    }

    /// Samples one candidate from the emitter's strategy.
    pub fn generate(&mut self) -> Candidate {
        self.released += 1;
        let mut candidate = Candidate::new(self.strategy.sample());
        candidate.generation = self.strategy.generations();
        candidate
    }

    /// Accepts an evaluated candidate along with its archive outcome.
    ///
    /// Once a full population has come back, the emitter ranks it and adapts
    /// its strategy, restarting around an archive elite when the policy or
    /// the strategy demands it.
    pub fn return_evaluated(
        &mut self,
        candidate: Candidate,
        outcome: AddOutcome,
        map: &mut FeatureMap,
    ) {
        self.released = self.released.saturating_sub(1);
        self.population.push((candidate, outcome));
        if self.population.len() >= self.population_size {
            self.update_distribution(map);
        }
    }

    fn update_distribution(&mut self, map: &mut FeatureMap) {
        let population = std::mem::take(&mut self.population);
        let ranked = match &self.policy {
            Policy::Improvement => rank_by_improvement(population),
            Policy::Optimizing { num_parents } => rank_by_fitness(population, *num_parents),
            Policy::RandomDirection { direction, origin } => {
                rank_by_projection(population, direction, origin, self.strategy.num_elites())
            }
        };

        let restarted = match ranked {
            Some(parents) => {
                let spread = parents[0].fitness - parents[parents.len() - 1].fitness;
                let vectors: Vec<DVector<f64>> = parents
                    .iter()
                    .map(|parent| DVector::from_column_slice(&parent.params))
                    .collect();
                self.strategy.adapt_ranked(&vectors, spread)
            }
            // Nothing this generation moved the archive; the region is
            // exhausted.
            None => {
                self.strategy.restart();
                true
            }
        };

        if restarted {
            self.reseed(map);
        }
    }

    /// Points the freshly restarted strategy at a new region of the archive.
    fn reseed(&mut self, map: &mut FeatureMap) {
        self.restarts += 1;
        let num_params = self.strategy.num_params();

        match &mut self.policy {
            Policy::Improvement | Policy::Optimizing { .. } => {
                let mean = match map.random_elite() {
                    Ok(elite) => DVector::from_column_slice(&elite.params),
                    // Archive still empty: keep searching from the origin.
                    Err(_) => DVector::zeros(num_params),
                };
                self.strategy.set_mean(mean);
            }
            Policy::RandomDirection { direction, origin } => {
                let num_features = map.num_features();
                let (mean, seed_origin) = match map.random_elite() {
                    Ok(elite) => (
                        DVector::from_column_slice(&elite.params),
                        DVector::from_column_slice(&elite.features),
                    ),
                    Err(_) => (DVector::zeros(num_params), DVector::zeros(num_features)),
                };
                *direction = random_unit_direction(&mut self.rng, num_features);
                *origin = seed_origin;
                self.strategy.set_mean(mean);
            }
        }
    }
}

/// Archive additions only, novel cells ahead of improvements, each class by
/// its fitness gain. `None` when nothing was archived.
fn rank_by_improvement(population: Vec<(Candidate, AddOutcome)>) -> Option<Vec<Candidate>> {
    let mut scored: Vec<(f64, f64, Candidate)> = population
        .into_iter()
        .filter_map(|(candidate, outcome)| match outcome {
            AddOutcome::NewCell => Some((1.0, candidate.fitness, candidate)),
            AddOutcome::Improved(gain) => Some((0.0, gain, candidate)),
            AddOutcome::Rejected => None,
        })
        .collect();
    if scored.is_empty() {
        return None;
    }
    scored.sort_by(|a, b| {
        (b.0, b.1)
            .partial_cmp(&(a.0, a.1))
            .unwrap_or(Ordering::Equal)
    });
    Some(scored.into_iter().map(|(_, _, candidate)| candidate).collect())
}

/// Top `num_parents` by raw fitness.
fn rank_by_fitness(
    population: Vec<(Candidate, AddOutcome)>,
    num_parents: usize,
) -> Option<Vec<Candidate>> {
    let mut candidates: Vec<Candidate> = population
        .into_iter()
        .map(|(candidate, _)| candidate)
        .collect();
    candidates.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal));
    candidates.truncate(num_parents);
    Some(candidates)
}

/// Archive additions ranked by the projection of their feature displacement
/// onto the emitter's direction. `None` when nothing was archived.
fn rank_by_projection(
    population: Vec<(Candidate, AddOutcome)>,
    direction: &DVector<f64>,
    origin: &DVector<f64>,
    num_parents: usize,
) -> Option<Vec<Candidate>> {
    let mut scored: Vec<(f64, Candidate)> = population
        .into_iter()
        .filter(|(_, outcome)| outcome.archived())
        .map(|(candidate, _)| {
            let displacement = DVector::from_column_slice(&candidate.features) - origin;
            (direction.dot(&displacement), candidate)
        })
        .collect();
    if scored.is_empty() {
        return None;
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(num_parents);
    Some(scored.into_iter().map(|(_, candidate)| candidate).collect())
}

fn random_unit_direction(rng: &mut Pcg64, dims: usize) -> DVector<f64> {
    let mut direction = DVector::from_fn(dims, |_, _| rng.sample::<f64, _>(StandardNormal));
    let norm = direction.norm();
    if norm > 0.0 {
        direction /= norm;
    } else {
        direction[0] = 1.0;
    }
    direction
}
