//! Quick search performance test

use std::time::Instant;

use cma_me::{
    archive::MapSummary,
    benchmarks::BenchmarkDomain,
    schema::{
        AlgorithmConfig, CmaEsConfig, ExperimentConfig, MapElitesConfig, MapElitesLineConfig,
    },
    search::build_algorithm,
};

struct RunStats {
    num_evaluated: usize,
    best_fitness: f64,
    cells_occupied: usize,
    qd_score: f64,
    elapsed_secs: f64,
}

fn main() {
    println!("=== Search Performance Test ===\n");

    // Default CMA-ME pool across problem sizes
    for num_params in [10, 20, 50] {
        println!("Dimensions: {}", num_params);

        let config = ExperimentConfig {
            num_params,
            num_to_evaluate: 5_000,
            random_seed: Some(42),
            ..Default::default()
        };
        let stats = run_experiment(&config);

        println!("  Evaluations:    {}", stats.num_evaluated);
        println!("  Elapsed:        {:.2}s", stats.elapsed_secs);
        println!(
            "  Evals/sec:      {:.1}",
            stats.num_evaluated as f64 / stats.elapsed_secs
        );
        println!("  Cells occupied: {}", stats.cells_occupied);
        println!("  QD-score:       {:.2}", stats.qd_score);
        println!("  Best fitness:   {:.4}", stats.best_fitness);
        println!();
    }

    println!("=== Algorithm Comparison (fixed 20 dimensions) ===\n");

    let algorithms = [
        AlgorithmConfig::CmaEs(CmaEsConfig::default()),
        AlgorithmConfig::MapElites(MapElitesConfig::default()),
        AlgorithmConfig::MapElitesLine(MapElitesLineConfig::default()),
        AlgorithmConfig::default(),
    ];

    for algorithm in algorithms {
        let config = ExperimentConfig {
            num_params: 20,
            num_to_evaluate: 5_000,
            algorithm,
            random_seed: Some(42),
            ..Default::default()
        };
        let name = config.algorithm.name();
        let stats = run_experiment(&config);

        println!(
            "{}: best={:.4}, cells={}, qd={:.2} ({:.1} evals/sec)",
            name,
            stats.best_fitness,
            stats.cells_occupied,
            stats.qd_score,
            stats.num_evaluated as f64 / stats.elapsed_secs
        );
    }
}

fn run_experiment(config: &ExperimentConfig) -> RunStats {
    config.validate().unwrap();
    let domain = BenchmarkDomain::new(config.objective, config.num_params);
    let mut algorithm = build_algorithm(config);

    let start = Instant::now();
    let mut num_evaluated = 0usize;
    let mut best_fitness = f64::NEG_INFINITY;

    while algorithm.is_running() {
        let Some(mut candidate) = algorithm.generate() else {
            break;
        };
        domain.evaluate(&mut candidate);
        let finalized = algorithm.return_evaluated(candidate).unwrap();
        num_evaluated += 1;
        if finalized.fitness > best_fitness {
            best_fitness = finalized.fitness;
        }
    }
    let elapsed = start.elapsed();

    let (cells_occupied, qd_score) = match algorithm.archive() {
        Some(map) => {
            let summary = MapSummary::from_map(map, num_evaluated);
            (summary.cells_occupied, summary.qd_score)
        }
        None => (0, 0.0),
    };

    RunStats {
        num_evaluated,
        best_fitness,
        cells_occupied,
        qd_score,
        elapsed_secs: elapsed.as_secs_f64(),
    }
}
