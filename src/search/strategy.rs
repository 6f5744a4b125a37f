//! Covariance matrix adaptation over a ranked stream of evaluated candidates.
//!
//! `EvolutionStrategy` is the numerical core shared by every CMA-based
//! algorithm in this crate. It samples candidates from a multivariate normal
//! distribution and adapts that distribution's mean, covariance, and step
//! size from ranked feedback. Callers choose the ranking: the plain CMA-ES
//! wrapper buffers a full population and ranks by raw fitness, while the
//! archive-driven emitters rank by their own policies and feed the result to
//! [`EvolutionStrategy::adapt_ranked`] directly.
//!
//! When the sampling distribution degenerates (ill-conditioned covariance,
//! collapsed search area, or flat parent fitness) the strategy resets itself
//! to a fresh distribution and reports the restart to the caller, which
//! re-seeds the mean according to its own policy.
//!
//! # Example
//!
//! ```
//! use cma_me::search::EvolutionStrategy;
//!
//! let mut strategy = EvolutionStrategy::new(10, Some(8), None, 0.5, 7);
//! let params = strategy.sample();
//! assert_eq!(params.len(), 10);
//! ```

use std::cmp::Ordering;

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::search::candidate::Candidate;
use crate::search::covariance::CovarianceState;

/// Restart when the covariance condition number exceeds this bound.
const MAX_CONDITION_NUMBER: f64 = 1e14;
/// Restart when the scaled longest axis shrinks below this bound.
const MIN_SEARCH_AREA: f64 = 1e-11;
/// Restart when the ranked parents' fitness spread collapses below this bound.
const MIN_FITNESS_SPREAD: f64 = 1e-12;

/// Scalar adaptation constants derived from the problem size and the number
/// of ranked parents.
#[derive(Debug, Clone)]
pub struct CmaConstants {
    /// Recombination weights, positive, descending, summing to one.
    pub weights: Vec<f64>,
    /// Variance-effective selection mass `(sum w)^2 / sum w^2`.
    pub mu_eff: f64,
    /// Decay rate of the covariance evolution path.
    pub c_c: f64,
    /// Decay rate of the step-size evolution path.
    pub c_sigma: f64,
    /// Learning rate of the rank-one covariance update.
    pub c_1: f64,
    /// Learning rate of the rank-mu covariance update.
    pub c_mu: f64,
    /// Damping applied to step-size changes.
    pub damping: f64,
    /// Expected norm of an `N(0, I)` draw in this dimension.
    pub chi_n: f64,
}

impl CmaConstants {
    /// Derives the adaptation constants for `num_parents` ranked parents in a
    /// `num_params`-dimensional problem.
    pub fn derive(num_params: usize, num_parents: usize) -> Self {
        let n = num_params as f64;
        let mu = num_parents as f64;

        let mut weights: Vec<f64> = (0..num_parents)
            .map(|rank| (mu + 0.5).ln() - ((rank + 1) as f64).ln())
            .collect();
        let total: f64 = weights.iter().sum();
        for weight in &mut weights {
            *weight /= total;
        }

        let sum_squares: f64 = weights.iter().map(|w| w * w).sum();
        let mu_eff = 1.0 / sum_squares;

        let c_c = (4.0 + mu_eff / n) / (n + 4.0 + 2.0 * mu_eff / n);
        let c_sigma = (mu_eff + 2.0) / (n + mu_eff + 5.0);
        let c_1 = 2.0 / ((n + 1.3).powi(2) + mu_eff);
        let c_mu =
            (1.0 - c_1).min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((n + 2.0).powi(2) + mu_eff));
        let damping = 1.0 + 2.0 * (((mu_eff - 1.0) / (n + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let chi_n = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n));

        Self {
            weights,
            mu_eff,
            c_c,
            c_sigma,
            c_1,
            c_mu,
            damping,
            chi_n,
        }
    }
}

/// A self-restarting CMA-ES sampling distribution.
pub struct EvolutionStrategy {
    num_params: usize,
    population_size: usize,
    num_elites: usize,
    initial_step: f64,
    constants: CmaConstants,
    mean: DVector<f64>,
    step_size: f64,
    path_c: DVector<f64>,
    path_sigma: DVector<f64>,
    covariance: CovarianceState,
    buffer: Vec<Candidate>,
    generations: usize,
    restarts: usize,
    rng: Pcg64,
}

impl EvolutionStrategy {
    /// Creates a strategy with a randomized mean and identity covariance.
    ///
    /// `population_size` defaults to `4 + floor(3 ln n)` and `num_elites` to
    /// half the population when unset.
    pub fn new(
        num_params: usize,
        population_size: Option<usize>,
        num_elites: Option<usize>,
        mutation_power: f64,
        seed: u64,
    ) -> Self {
        let n = num_params as f64;
        let population_size = population_size.unwrap_or_else(|| 4 + (3.0 * n.ln()).floor() as usize);
        let num_elites = num_elites.unwrap_or(population_size / 2).max(1);

        let mut strategy = Self {
            num_params,
            population_size,
            num_elites,
            initial_step: mutation_power,
            constants: CmaConstants::derive(num_params, num_elites),
            mean: DVector::zeros(num_params),
            step_size: mutation_power,
            path_c: DVector::zeros(num_params),
            path_sigma: DVector::zeros(num_params),
            covariance: CovarianceState::identity(num_params),
            buffer: Vec::with_capacity(population_size),
            generations: 0,
            restarts: 0,
            rng: Pcg64::seed_from_u64(seed),
        };
        strategy.randomize_mean();
        strategy
    }

    /// Problem dimensionality.
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Number of candidates per generation.
    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Number of ranked parents kept per generation in the buffered path.
    pub fn num_elites(&self) -> usize {
        self.num_elites
    }

    /// Number of completed adaptation steps since construction.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Number of degenerate restarts since construction.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Current distribution mean.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Current global step size.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Adaptation constants currently in effect.
    pub fn constants(&self) -> &CmaConstants {
        &self.constants
    }

    /// Moves the distribution mean, leaving the rest of the state alone.
    pub fn set_mean(&mut self, mean: DVector<f64>) {
        debug_assert_eq!(mean.len(), self.num_params);
        self.mean = mean;
    }

    /// Re-draws the distribution mean from a standard normal.
    pub fn randomize_mean(&mut self) {
        for value in self.mean.iter_mut() {
            *value = self.rng.sample(StandardNormal);
        }
    }

    /// Draws one parameter vector from the current distribution.
    pub fn sample(&mut self) -> Vec<f64> {
        let draws: Vec<f64> = (0..self.num_params)
            .map(|_| self.rng.sample(StandardNormal))
            .collect();

        let step_size = self.step_size;
        let decomp = self.covariance.decomposition();
        let scaled = DVector::from_iterator(
            draws.len(),
            draws
                .iter()
                .zip(decomp.sqrt_eigenvalues.iter())
                .map(|(&draw, &scale)| draw * step_size * scale),
        );
        let point = &decomp.eigenbasis * scaled + &self.mean;
        point.as_slice().to_vec()
    }

    /// Buffers an evaluated candidate; once a full population has been
    /// returned, ranks it by fitness and adapts.
    ///
    /// Returns `None` while the population is still filling, otherwise
    /// whether the adaptation step ended in a restart.
    pub fn return_evaluated(&mut self, candidate: Candidate) -> Option<bool> {
        self.buffer.push(candidate);
        if self.buffer.len() < self.population_size {
            return None;
        }

        let mut population = std::mem::take(&mut self.buffer);
        population.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal));
        population.truncate(self.num_elites);

        let fitness_spread = population[0].fitness - population[population.len() - 1].fitness;
        let parents: Vec<DVector<f64>> = population
            .iter()
            .map(|candidate| DVector::from_column_slice(&candidate.params))
            .collect();

        let restarted = self.adapt_ranked(&parents, fitness_spread);
        if restarted {
            self.randomize_mean();
        }
        Some(restarted)
    }

    /// Adapts the distribution from parents already ranked best-first by the
    /// caller's policy.
    ///
    /// `fitness_spread` is the fitness difference between the first- and
    /// last-ranked parent; a collapsed spread triggers a restart. Returns
    /// whether the distribution was reset, in which case the caller is
    /// expected to re-seed the mean.
    pub fn adapt_ranked(&mut self, parents: &[DVector<f64>], fitness_spread: f64) -> bool {
        debug_assert!(!parents.is_empty());

        if parents.len() != self.constants.weights.len() {
            self.constants = CmaConstants::derive(self.num_params, parents.len());
        }
        self.generations += 1;

        let n = self.num_params as f64;
        let &CmaConstants {
            mu_eff,
            c_c,
            c_sigma,
            c_1,
            c_mu,
            ..
        } = &self.constants;

        // Weighted recombination of the ranked parents.
        let old_mean = std::mem::replace(&mut self.mean, DVector::zeros(self.num_params));
        for (parent, &weight) in parents.iter().zip(self.constants.weights.iter()) {
            self.mean.axpy(weight, parent, 1.0);
        }
        let delta = &self.mean - &old_mean;

        // This generation was sampled from the current decomposition; read it
        // once for the path update and the degeneracy check below.
        let (whitened, condition_number, max_eigenvalue) = {
            let decomp = self.covariance.decomposition();
            (
                &decomp.inverse_sqrt * &delta,
                decomp.condition_number,
                decomp.eigenvalues.max(),
            )
        };

        // Step-size evolution path.
        let path_scale = (c_sigma * (2.0 - c_sigma) * mu_eff).sqrt() / self.step_size;
        self.path_sigma = &self.path_sigma * (1.0 - c_sigma) + whitened * path_scale;

        let ps_square = self.path_sigma.norm_squared();
        let decay = 1.0 - (1.0 - c_sigma).powi(2 * self.generations as i32);
        let hsig = if ps_square / n / decay < 2.0 + 4.0 / (n + 1.0) {
            1.0
        } else {
            0.0
        };

        // Covariance evolution path.
        self.path_c =
            &self.path_c * (1.0 - c_c) + &delta * (hsig * (c_c * (2.0 - c_c) * mu_eff).sqrt());

        // Rank-one and rank-mu covariance updates.
        let c_1a = c_1 * (1.0 - (1.0 - hsig * hsig) * c_c * (2.0 - c_c));
        self.covariance.scale(1.0 - c_1a - c_mu);
        self.covariance.add_rank_one(c_1, &self.path_c);
        let sigma_square = self.step_size * self.step_size;
        for (parent, &weight) in parents.iter().zip(self.constants.weights.iter()) {
            let displacement = parent - &old_mean;
            self.covariance
                .add_rank_one(weight * c_mu / sigma_square, &displacement);
        }

        let search_area = self.step_size * max_eigenvalue.sqrt();
        let restarted = condition_number > MAX_CONDITION_NUMBER
            || search_area < MIN_SEARCH_AREA
            || fitness_spread.abs() < MIN_FITNESS_SPREAD;
        if restarted {
            log::debug!(
                "restarting degenerate strategy (condition {:.3e}, area {:.3e}, spread {:.3e})",
                condition_number,
                search_area,
                fitness_spread
            );
            self.reinitialize();
        }

        // The step-size update runs even directly after a restart, where the
        // zeroed path gives the fresh distribution a mild initial shrink.
        let cn = self.constants.c_sigma / self.constants.damping;
        let ps_square = self.path_sigma.norm_squared();
        self.step_size *= (cn * (ps_square / n - 1.0) / 2.0).min(1.0).exp();

        restarted
    }

    /// Discards the current distribution and starts fresh around a zero
    /// mean, keeping the generation counter and RNG stream.
    pub fn restart(&mut self) {
        self.reinitialize();
    }

    /// Resets everything except the generation counter and RNG stream to a
    /// fresh identity distribution around a zero mean.
    fn reinitialize(&mut self) {
        self.constants = CmaConstants::derive(self.num_params, self.num_elites);
        self.mean = DVector::zeros(self.num_params);
        self.step_size = self.initial_step;
        self.path_c = DVector::zeros(self.num_params);
        self.path_sigma = DVector::zeros(self.num_params);
        self.covariance = CovarianceState::identity(self.num_params);
        self.buffer.clear();
        self.restarts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn evaluated(params: Vec<f64>, fitness: f64) -> Candidate {
        let mut candidate = Candidate::new(params);
        candidate.fitness = fitness;
        candidate
    }

    #[test]
    fn test_constants_match_their_formulas() {
        let constants = CmaConstants::derive(20, 6);

        let total: f64 = constants.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(
            constants
                .weights
                .windows(2)
                .all(|pair| pair[0] > pair[1] && pair[1] > 0.0)
        );
        assert!(constants.mu_eff > 1.0 && constants.mu_eff < 6.0);
        assert!(constants.damping >= 1.0);

        let n = 20.0_f64;
        let expected_chi = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n));
        assert!((constants.chi_n - expected_chi).abs() < 1e-12);
    }

    #[test]
    fn test_default_population_size_scales_with_dimension() {
        let strategy = EvolutionStrategy::new(20, None, None, 0.5, 11);
        // 4 + floor(3 ln 20) = 12
        assert_eq!(strategy.population_size(), 12);
        assert_eq!(strategy.num_elites(), 6);
    }

    #[test]
    fn test_sample_has_problem_dimension_and_is_finite() {
        let mut strategy = EvolutionStrategy::new(8, Some(6), None, 0.3, 42);
        for _ in 0..20 {
            let params = strategy.sample();
            assert_eq!(params.len(), 8);
            assert!(params.iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn test_mean_follows_ranked_parents() {
        let dim = 5;
        let mut strategy = EvolutionStrategy::new(dim, Some(6), Some(3), 0.5, 3);

        // Feed hand-built populations whose fitness rewards the first
        // coordinate, with candidates offset from the current mean. The new
        // mean must move strictly along that coordinate every generation.
        let mut previous = strategy.mean()[0];
        for _ in 0..3 {
            let base: Vec<f64> = strategy.mean().as_slice().to_vec();
            for offset in 1..=6 {
                let mut params = base.clone();
                params[0] += offset as f64 * 0.1;
                let result = strategy.return_evaluated(evaluated(params, offset as f64));
                if offset < 6 {
                    assert!(result.is_none());
                } else {
                    assert_eq!(result, Some(false));
                }
            }
            let current = strategy.mean()[0];
            assert!(current > previous);
            previous = current;
        }
        assert_eq!(strategy.generations(), 3);
        assert_eq!(strategy.restarts(), 0);
    }

    #[test]
    fn test_flat_fitness_triggers_a_restart() {
        let mut strategy = EvolutionStrategy::new(4, Some(4), Some(2), 0.5, 9);

        let mut outcome = None;
        for _ in 0..4 {
            outcome = strategy.return_evaluated(evaluated(vec![0.1, 0.2, 0.3, 0.4], 1.0));
        }
        assert_eq!(outcome, Some(true));
        assert_eq!(strategy.restarts(), 1);

        // Post-restart state is a fresh distribution with a slightly damped
        // step size and a re-randomized mean.
        assert!(strategy.step_size() > 0.0);
        assert!(strategy.step_size() < 0.5);
        assert!(strategy.mean().iter().all(|v| v.is_finite()));
        assert!(strategy.path_sigma.norm_squared() == 0.0);
        assert!(strategy.buffer.is_empty());
        let decomp = strategy.covariance.decomposition();
        assert!(decomp.eigenvalues.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_ranked_adaptation_recomputes_constants_for_parent_count() {
        let mut strategy = EvolutionStrategy::new(6, Some(10), Some(5), 0.5, 21);
        assert_eq!(strategy.constants().weights.len(), 5);

        let parents: Vec<DVector<f64>> = (0..3)
            .map(|i| DVector::from_element(6, i as f64 * 0.1))
            .collect();
        let restarted = strategy.adapt_ranked(&parents, 2.0);
        assert!(!restarted);
        assert_eq!(strategy.constants().weights.len(), 3);
    }

    #[test]
    fn test_full_loop_on_sphere_stays_finite() {
        let mut strategy = EvolutionStrategy::new(6, Some(8), None, 0.5, 77);
        for _ in 0..20 {
            for _ in 0..8 {
                let params = strategy.sample();
                let fitness = -params.iter().map(|p| p * p).sum::<f64>();
                strategy.return_evaluated(evaluated(params, fitness));
            }
        }
        assert!(strategy.mean().iter().all(|v| v.is_finite()));
        assert!(strategy.step_size().is_finite() && strategy.step_size() > 0.0);
        assert_eq!(strategy.generations(), 20);
    }

    proptest! {
        #[test]
        fn test_weights_are_normalized_for_any_parent_count(parents in 1usize..50) {
            let constants = CmaConstants::derive(12, parents);
            let total: f64 = constants.weights.iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            prop_assert!(constants.weights.iter().all(|&w| w > 0.0));
            prop_assert!(constants.mu_eff >= 1.0 - 1e-9);
            prop_assert!(constants.mu_eff <= parents as f64 + 1e-9);
        }
    }
}
