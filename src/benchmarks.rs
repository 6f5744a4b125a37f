//! Benchmark module - Shifted continuous objectives for exercising the search.
//!
//! Both objectives move their optimum off the origin by a fixed per-axis
//! offset, so an algorithm that merely contracts toward zero scores poorly.
//! Fitness is negated cost (higher is better, optimum at zero), and the
//! evaluator also derives a normalized fitness in `[0, 1]` against the worst
//! value reachable inside the canonical `[-5.12, 5.12]` box, which keeps
//! archive statistics comparable across objectives and dimensions.
//!
//! Along with fitness, evaluation records the stats that feature maps key
//! on: every raw parameter as `Param{i}`, plus the box-clamped sums of the
//! first and second halves of the parameter vector.

use crate::schema::ObjectiveKind;
use crate::search::Candidate;

/// Canonical parameter box radius the normalization assumes.
const BOX_RADIUS: f64 = 5.12;
/// Per-axis shift applied to every objective's optimum.
const OFFSET: f64 = 5.12 * 0.4;
/// Rastrigin's modulation amplitude.
const RASTRIGIN_A: f64 = 10.0;

/// A benchmark objective bound to a fixed parameter count.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkDomain {
    objective: ObjectiveKind,
    num_params: usize,
    worst_fitness: f64,
}

impl BenchmarkDomain {
    /// Prepares the objective and its normalization bound.
    pub fn new(objective: ObjectiveKind, num_params: usize) -> Self {
        let n = num_params as f64;
        let extreme = BOX_RADIUS + OFFSET;
        let worst_fitness = match objective {
            ObjectiveKind::Sphere => -(n * extreme * extreme),
            ObjectiveKind::Rastrigin => -(n * (extreme * extreme + 2.0 * RASTRIGIN_A)),
        };
        Self {
            objective,
            num_params,
            worst_fitness,
        }
    }

    /// The objective being evaluated.
    pub fn objective(&self) -> ObjectiveKind {
        self.objective
    }

    /// Scores a candidate in place: fitness, normalized fitness, and the
    /// feature stats.
    pub fn evaluate(&self, candidate: &mut Candidate) {
        debug_assert_eq!(candidate.params.len(), self.num_params);

        let fitness = match self.objective {
            ObjectiveKind::Sphere => sphere(&candidate.params),
            ObjectiveKind::Rastrigin => rastrigin(&candidate.params),
        };
        candidate.fitness = fitness;
        candidate.norm_fitness = ((fitness - self.worst_fitness) / -self.worst_fitness).clamp(0.0, 1.0);

        for index in 0..candidate.params.len() {
            let value = candidate.params[index];
            candidate.record_stat(format!("Param{}", index), value);
        }
        // The second half takes the middle parameter when the count is odd.
        let half = self.num_params / 2;
        let first: f64 = clamped_sum(&candidate.params[..half]);
        let second: f64 = clamped_sum(&candidate.params[half..]);
        candidate.record_stat("FirstHalfSum", first);
        candidate.record_stat("SecondHalfSum", second);
    }
}

/// Sums coordinates after clamping each into the canonical box, so the
/// half-sum stats stay inside the feature ranges the default map declares.
fn clamped_sum(params: &[f64]) -> f64 {
    params
        .iter()
        .map(|v| v.clamp(-BOX_RADIUS, BOX_RADIUS))
        .sum()
}

fn sphere(params: &[f64]) -> f64 {
    -params
        .iter()
        .map(|&x| {
            let v = x - OFFSET;
            v * v
        })
        .sum::<f64>()
}

fn rastrigin(params: &[f64]) -> f64 {
    let n = params.len() as f64;
    let sum: f64 = params
        .iter()
        .map(|&x| {
            let v = x - OFFSET;
            v * v - RASTRIGIN_A * (2.0 * std::f64::consts::PI * v).cos()
        })
        .sum();
    -(RASTRIGIN_A * n + sum)
}
