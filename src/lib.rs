//! CMA-ME - Quality-diversity optimization with covariance matrix adaptation.
//!
//! This crate implements a quality-diversity (QD) search engine: rather than
//! converging on a single best solution, it fills an archive of behaviorally
//! diverse, locally-best solutions while a self-adapting evolution strategy
//! drives candidate generation.
//!
//! # Architecture
//!
//! The crate is split into four main modules:
//!
//! - `schema`: Experiment configuration types and validation
//! - `search`: CMA-ES, CMA-ME emitters/scheduler, MAP-Elites variants
//! - `archive`: The feature-map archive (one elite per behavioral cell)
//! - `logging`: CSV/JSONL sinks observing a run
//!
//! # Example
//!
//! ```rust,no_run
//! use cma_me::{
//!     benchmarks::BenchmarkDomain,
//!     schema::ExperimentConfig,
//!     search::{SearchAlgorithm, build_algorithm},
//! };
//!
//! let config = ExperimentConfig::default();
//! config.validate().unwrap();
//!
//! let domain = BenchmarkDomain::new(config.objective, config.num_params);
//! let mut algorithm = build_algorithm(&config);
//!
//! // Drive the search: generate, evaluate externally, return.
//! while algorithm.is_running() {
//!     if let Some(mut candidate) = algorithm.generate() {
//!         domain.evaluate(&mut candidate);
//!         algorithm.return_evaluated(candidate).unwrap();
//!     }
//! }
//!
//! if let Some(archive) = algorithm.archive() {
//!     println!("Occupied cells: {}", archive.cells_occupied());
//! }
//! ```

pub mod archive;
pub mod benchmarks;
pub mod logging;
pub mod schema;
pub mod search;

// Re-export commonly used types
pub use archive::{FeatureMap, MapSummary};
pub use search::{Candidate, SearchAlgorithm, SearchError, build_algorithm};
