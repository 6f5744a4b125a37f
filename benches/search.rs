//! Benchmarks for the search hot paths.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use cma_me::{
    archive::FeatureMap,
    schema::{FeatureConfig, MapConfig, MapKind},
    search::{Candidate, EvolutionStrategy},
};

fn bench_strategy_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_sample");

    for dim in [10, 20, 50, 100] {
        let mut strategy = EvolutionStrategy::new(dim, None, None, 0.5, 7);

        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, _| {
            b.iter(|| black_box(strategy.sample()));
        });
    }

    group.finish();
}

fn bench_strategy_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_generation");

    for dim in [10, 20, 50] {
        let mut strategy = EvolutionStrategy::new(dim, None, None, 0.5, 7);
        let population_size = strategy.population_size();

        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, _| {
            b.iter(|| {
                // One full generation: sample, score, return, adapt.
                for _ in 0..population_size {
                    let params = strategy.sample();
                    let fitness = -params.iter().map(|p| p * p).sum::<f64>();
                    let mut candidate = Candidate::new(params);
                    candidate.fitness = fitness;
                    black_box(strategy.return_evaluated(candidate));
                }
            });
        });
    }

    group.finish();
}

fn bench_archive_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive_add");

    for resolution in [20, 50, 100] {
        let config = MapConfig {
            kind: MapKind::Fixed,
            start_size: resolution,
            end_size: resolution,
            features: vec![
                FeatureConfig {
                    name: "FirstHalfSum".to_string(),
                    min_value: -10.0,
                    max_value: 10.0,
                },
                FeatureConfig {
                    name: "SecondHalfSum".to_string(),
                    min_value: -10.0,
                    max_value: 10.0,
                },
            ],
        };
        let mut map = FeatureMap::new(&config, 1_000_000, 7);

        let mut rng = Pcg64::seed_from_u64(11);
        let candidates: Vec<Candidate> = (0..1024)
            .map(|_| {
                let mut candidate = Candidate::new(vec![0.0; 8]);
                candidate.fitness = rng.gen_range(-10.0..0.0);
                candidate.norm_fitness = rng.gen_range(0.0..1.0);
                candidate.features =
                    vec![rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)];
                candidate
            })
            .collect();

        let mut index = 0usize;
        group.bench_with_input(
            BenchmarkId::from_parameter(resolution),
            &resolution,
            |b, _| {
                b.iter(|| {
                    index = (index + 1) % candidates.len();
                    black_box(map.add(candidates[index].clone()));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_strategy_sample,
    bench_strategy_generation,
    bench_archive_add
);
criterion_main!(benches);
