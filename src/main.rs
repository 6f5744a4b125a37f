//! CMA-ME CLI - Run quality-diversity search trials from JSON configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use cma_me::{
    archive::MapSummary,
    benchmarks::BenchmarkDomain,
    logging::{IndividualLog, SnapshotLog, SummaryLog},
    schema::ExperimentConfig,
    search::{Candidate, SearchError, build_algorithm},
};

/// Candidates scored per rayon batch. Returns interleave with sampling so the
/// archive the algorithms draw parents from never goes more than one batch
/// stale.
const EVALUATION_BATCH: usize = 64;

#[derive(Debug, thiserror::Error)]
enum TrialError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("no source can generate candidates and none are in flight")]
    Stalled,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Run a quality-diversity search trial from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to experiment configuration file");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: ExperimentConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    config.validate().unwrap_or_else(|e| {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    });

    println!("CMA-ME Quality-Diversity Search");
    println!("===============================");
    println!("Algorithm: {}", config.algorithm.name());
    println!(
        "Objective: {:?} over {} parameters",
        config.objective, config.num_params
    );
    println!("Budget: {} evaluations", config.num_to_evaluate);
    if config.uses_archive() {
        println!(
            "Map: {:?}, {}..{} bins per dimension, {} features",
            config.map.kind,
            config.map.start_size,
            config.map.end_size,
            config.map.features.len()
        );
    }
    println!();

    run_trial(&config).unwrap_or_else(|e| {
        eprintln!("Trial failed: {}", e);
        std::process::exit(1);
    });
}

/// Drives one trial to budget exhaustion: generate a batch, evaluate it in
/// parallel, return each candidate, and feed the configured log sinks.
fn run_trial(config: &ExperimentConfig) -> Result<(), TrialError> {
    let domain = BenchmarkDomain::new(config.objective, config.num_params);
    let mut algorithm = build_algorithm(config);

    let log_dir = Path::new(&config.logging.log_dir);
    let mut summary_log = (config.logging.summary_frequency > 0 && config.uses_archive())
        .then(|| SummaryLog::create(&log_dir.join("summary.csv")))
        .transpose()?;
    let mut individual_log = config
        .logging
        .log_individuals
        .then(|| IndividualLog::create(&log_dir.join("individuals.csv")))
        .transpose()?;
    let mut snapshot_log = (config.logging.snapshot_frequency > 0 && config.uses_archive())
        .then(|| SnapshotLog::create(&log_dir.join("snapshots.jsonl")))
        .transpose()?;

    println!("Running search...");
    let start = Instant::now();
    let progress_every = (config.num_to_evaluate / 10).max(1);

    let mut num_evaluated = 0usize;
    let mut best_fitness = f64::NEG_INFINITY;
    let mut batch: Vec<Candidate> = Vec::with_capacity(EVALUATION_BATCH);

    while algorithm.is_running() {
        let limit = EVALUATION_BATCH.min(config.num_to_evaluate - num_evaluated);
        while batch.len() < limit && !algorithm.is_blocking() {
            let Some(candidate) = algorithm.generate() else {
                break;
            };
            batch.push(candidate);
        }
        if batch.is_empty() {
            return Err(TrialError::Stalled);
        }

        batch
            .par_iter_mut()
            .for_each(|candidate| domain.evaluate(candidate));

        for candidate in batch.drain(..) {
            let finalized = algorithm.return_evaluated(candidate)?;
            num_evaluated += 1;
            if finalized.fitness > best_fitness {
                best_fitness = finalized.fitness;
            }

            if let Some(log) = individual_log.as_mut() {
                log.append(&finalized)?;
            }
            if let Some(map) = algorithm.archive() {
                if let Some(log) = summary_log.as_mut()
                    && num_evaluated % config.logging.summary_frequency == 0
                {
                    log.append(&MapSummary::from_map(map, num_evaluated))?;
                }
                if let Some(log) = snapshot_log.as_mut()
                    && num_evaluated % config.logging.snapshot_frequency == 0
                {
                    log.append(map, num_evaluated)?;
                }
            }

            if num_evaluated % progress_every == 0 {
                let rate = num_evaluated as f64 / start.elapsed().as_secs_f64();
                match algorithm.archive() {
                    Some(map) => println!(
                        "  Evaluated {}/{}: best={:.6}, cells={}, {:.1} evals/s",
                        num_evaluated,
                        config.num_to_evaluate,
                        best_fitness,
                        map.cells_occupied(),
                        rate
                    ),
                    None => println!(
                        "  Evaluated {}/{}: best={:.6}, {:.1} evals/s",
                        num_evaluated, config.num_to_evaluate, best_fitness, rate
                    ),
                }
            }
        }
    }

    let elapsed = start.elapsed();

    // Close the logs on the final state even when the cadence missed it.
    if let Some(map) = algorithm.archive() {
        if let Some(log) = summary_log.as_mut()
            && num_evaluated % config.logging.summary_frequency != 0
        {
            log.append(&MapSummary::from_map(map, num_evaluated))?;
        }
        if let Some(log) = snapshot_log.as_mut()
            && num_evaluated % config.logging.snapshot_frequency != 0
        {
            log.append(map, num_evaluated)?;
        }
    }

    println!();
    println!("Search complete:");
    println!("  Best fitness: {:.6}", best_fitness);
    if let Some(map) = algorithm.archive() {
        let summary = MapSummary::from_map(map, num_evaluated);
        println!(
            "  Cells occupied: {} ({:.2}%)",
            summary.cells_occupied, summary.percent_occupied
        );
        println!("  QD-score: {:.4}", summary.qd_score);
        println!("  Max normalized fitness: {:.4}", summary.max_norm_fitness);
    }
    println!(
        "Time: {:.2}s ({:.1} evals/s)",
        elapsed.as_secs_f32(),
        num_evaluated as f32 / elapsed.as_secs_f32()
    );

    Ok(())
}

fn print_example_config() {
    let config = ExperimentConfig::default();

    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
