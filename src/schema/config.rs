//! Experiment configuration types.
//!
//! An experiment is described by a single JSON document: which search
//! algorithm to run, the feature-map layout, the benchmark objective, and
//! the logging cadences. `ExperimentConfig::validate` fails fast on
//! malformed configurations before any evaluation begins.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a quality-diversity search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Dimensionality of the parameter vectors being searched.
    pub num_params: usize,
    /// Total evaluation budget; the run terminates after this many returns.
    pub num_to_evaluate: usize,
    /// Benchmark objective to optimize.
    #[serde(default)]
    pub objective: ObjectiveKind,
    /// Search algorithm to use.
    pub algorithm: AlgorithmConfig,
    /// Feature-map archive layout (ignored by plain CMA-ES).
    #[serde(default)]
    pub map: MapConfig,
    /// Logging sinks and cadences.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_params: 20,
            num_to_evaluate: 25_000,
            objective: ObjectiveKind::default(),
            algorithm: AlgorithmConfig::default(),
            map: MapConfig::default(),
            logging: LoggingConfig::default(),
            random_seed: None,
        }
    }
}

/// Benchmark objective selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveKind {
    /// Shifted sphere: `-sum(v_i^2)`.
    Sphere,
    /// Shifted Rastrigin: highly multimodal.
    Rastrigin,
}

impl Default for ObjectiveKind {
    fn default() -> Self {
        Self::Sphere
    }
}

/// Search algorithm selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlgorithmConfig {
    /// Plain CMA-ES: single self-adapting distribution, no archive.
    CmaEs(CmaEsConfig),
    /// CMA-ME: a pool of CMA-ES emitters sharing a feature-map archive.
    CmaMe(CmaMeConfig),
    /// MAP-Elites: isotropic mutation of random archive elites.
    MapElites(MapElitesConfig),
    /// MAP-Elites with the directional "line" mutation between two elites.
    MapElitesLine(MapElitesLineConfig),
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self::CmaMe(CmaMeConfig::default())
    }
}

impl AlgorithmConfig {
    /// Short algorithm name for logs and run summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CmaEs(_) => "CMA-ES",
            Self::CmaMe(_) => "CMA-ME",
            Self::MapElites(_) => "MAP-Elites",
            Self::MapElitesLine(_) => "MAP-Elites-line",
        }
    }
}

/// Plain CMA-ES configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmaEsConfig {
    /// Population size per generation.
    /// If None, uses the CMA-ES default `4 + floor(3 ln n)`.
    #[serde(default)]
    pub population_size: Option<usize>,
    /// Number of ranked parents recombined each generation.
    /// If None, defaults to half the population size.
    #[serde(default)]
    pub num_elites: Option<usize>,
    /// Initial step size (sigma).
    #[serde(default = "default_mutation_power")]
    pub mutation_power: f64,
}

impl Default for CmaEsConfig {
    fn default() -> Self {
        Self {
            population_size: None,
            num_elites: None,
            mutation_power: default_mutation_power(),
        }
    }
}

/// CMA-ME configuration: the emitter pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmaMeConfig {
    /// Emitter definitions; each entry expands into `count` emitters.
    pub emitters: Vec<EmitterConfig>,
}

impl Default for CmaMeConfig {
    fn default() -> Self {
        Self {
            emitters: vec![EmitterConfig::default()],
        }
    }
}

/// Emitter policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitterKind {
    /// Ranks by archive improvement; restarts when a generation adds nothing.
    Improvement,
    /// Ranks by raw fitness; restarts only on numerical degeneracy.
    Optimizing,
    /// Ranks by feature-space projection onto a random direction.
    RandomDirection,
}

impl Default for EmitterKind {
    fn default() -> Self {
        Self::Improvement
    }
}

/// One emitter definition inside a CMA-ME pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Emitter policy.
    #[serde(rename = "type", default)]
    pub kind: EmitterKind,
    /// How many identical emitters this entry expands into.
    #[serde(default = "default_emitter_count")]
    pub count: usize,
    /// Candidates per generation for this emitter's strategy.
    #[serde(default = "default_emitter_population")]
    pub population_size: usize,
    /// Initial step size (sigma) after each restart.
    #[serde(default = "default_mutation_power")]
    pub mutation_power: f64,
    /// In-flight bound multiplier: the emitter blocks once it has
    /// `population_size * overflow_factor` unreturned candidates.
    #[serde(default = "default_overflow_factor")]
    pub overflow_factor: f64,
    /// Parent count for the Optimizing policy.
    /// If None, defaults to half the population size.
    #[serde(default)]
    pub num_parents: Option<usize>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            kind: EmitterKind::default(),
            count: default_emitter_count(),
            population_size: default_emitter_population(),
            mutation_power: default_mutation_power(),
            overflow_factor: default_overflow_factor(),
            num_parents: None,
        }
    }
}

/// MAP-Elites configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapElitesConfig {
    /// Unconditionally random candidates emitted before archive sampling.
    #[serde(default = "default_initial_population")]
    pub initial_population: usize,
    /// Standard deviation of the isotropic Gaussian mutation.
    #[serde(default = "default_mutation_power")]
    pub mutation_power: f64,
}

impl Default for MapElitesConfig {
    fn default() -> Self {
        Self {
            initial_population: default_initial_population(),
            mutation_power: default_mutation_power(),
        }
    }
}

/// MAP-Elites-Line configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapElitesLineConfig {
    /// Unconditionally random candidates emitted before archive sampling.
    #[serde(default = "default_initial_population")]
    pub initial_population: usize,
    /// Standard deviation of the isotropic component.
    #[serde(default = "default_mutation_power")]
    pub mutation_power: f64,
    /// Scale of the directional component along the vector between the
    /// two sampled parents.
    #[serde(default = "default_line_power")]
    pub mutation_power_2: f64,
}

impl Default for MapElitesLineConfig {
    fn default() -> Self {
        Self {
            initial_population: default_initial_population(),
            mutation_power: default_mutation_power(),
            mutation_power_2: default_line_power(),
        }
    }
}

/// Feature-map variant selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapKind {
    /// Constant resolution for the whole run.
    Fixed,
    /// Resolution follows the sizer schedule; elites are re-bucketed on
    /// every resolution change.
    Sliding,
}

impl Default for MapKind {
    fn default() -> Self {
        Self::Sliding
    }
}

/// Feature-map archive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Map variant.
    #[serde(rename = "type", default)]
    pub kind: MapKind,
    /// Per-dimension cell count at the start of the run.
    #[serde(default = "default_start_size")]
    pub start_size: usize,
    /// Per-dimension cell count at the end of the run.
    #[serde(default = "default_end_size")]
    pub end_size: usize,
    /// Behavioral feature dimensions.
    pub features: Vec<FeatureConfig>,
}

impl Default for MapConfig {
    fn default() -> Self {
        // Half-sums of a 20-parameter vector over [-5.12, 5.12].
        Self {
            kind: MapKind::default(),
            start_size: default_start_size(),
            end_size: default_end_size(),
            features: vec![
                FeatureConfig {
                    name: "FirstHalfSum".to_string(),
                    min_value: -51.2,
                    max_value: 51.2,
                },
                FeatureConfig {
                    name: "SecondHalfSum".to_string(),
                    min_value: -51.2,
                    max_value: 51.2,
                },
            ],
        }
    }
}

/// One behavioral feature dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Stat name resolved against each evaluated candidate.
    pub name: String,
    /// Lower bound of the binned range.
    pub min_value: f64,
    /// Upper bound of the binned range.
    pub max_value: f64,
}

/// Logging sinks and cadences, consumed by the trial driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append a summary CSV row every N evaluations (0 disables).
    #[serde(default = "default_summary_frequency")]
    pub summary_frequency: usize,
    /// Append a full archive snapshot every N evaluations (0 disables).
    #[serde(default)]
    pub snapshot_frequency: usize,
    /// Log every evaluated individual to CSV.
    #[serde(default = "default_log_individuals")]
    pub log_individuals: bool,
    /// Directory receiving all log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            summary_frequency: default_summary_frequency(),
            snapshot_frequency: 0,
            log_individuals: default_log_individuals(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_mutation_power() -> f64 {
    0.5
}
fn default_line_power() -> f64 {
    0.2
}
fn default_emitter_count() -> usize {
    5
}
fn default_emitter_population() -> usize {
    37
}
fn default_overflow_factor() -> f64 {
    1.0
}
fn default_initial_population() -> usize {
    100
}
fn default_start_size() -> usize {
    20
}
fn default_end_size() -> usize {
    50
}
fn default_summary_frequency() -> usize {
    100
}
fn default_log_individuals() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".to_string()
}

impl ExperimentConfig {
    /// Whether the configured algorithm runs against a feature-map archive.
    pub fn uses_archive(&self) -> bool {
        !matches!(self.algorithm, AlgorithmConfig::CmaEs(_))
    }

    /// Validate the configuration, failing fast before any evaluation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_params == 0 {
            return Err(ConfigError::InvalidNumParams);
        }
        if self.num_to_evaluate == 0 {
            return Err(ConfigError::InvalidBudget);
        }

        if self.uses_archive() {
            if self.map.features.is_empty() {
                return Err(ConfigError::MissingFeatures);
            }
            if self.map.start_size == 0 || self.map.end_size == 0 {
                return Err(ConfigError::InvalidMapSize);
            }
            for feature in &self.map.features {
                if !(feature.min_value < feature.max_value) {
                    return Err(ConfigError::InvalidFeatureRange(feature.name.clone()));
                }
            }
        }

        match &self.algorithm {
            AlgorithmConfig::CmaEs(cfg) => {
                validate_mutation_power(cfg.mutation_power)?;
                if let Some(pop) = cfg.population_size
                    && pop < 2
                {
                    return Err(ConfigError::PopulationTooSmall(pop));
                }
                if cfg.num_elites == Some(0) {
                    return Err(ConfigError::InvalidEliteCount);
                }
                if let (Some(elites), Some(pop)) = (cfg.num_elites, cfg.population_size)
                    && elites > pop
                {
                    return Err(ConfigError::TooManyElites {
                        elites,
                        population: pop,
                    });
                }
            }
            AlgorithmConfig::CmaMe(cfg) => {
                if cfg.emitters.is_empty() {
                    return Err(ConfigError::NoEmitters);
                }
                for (index, emitter) in cfg.emitters.iter().enumerate() {
                    if emitter.count == 0 {
                        return Err(ConfigError::InvalidEmitterCount { emitter: index });
                    }
                    if emitter.population_size < 2 {
                        return Err(ConfigError::PopulationTooSmall(emitter.population_size));
                    }
                    validate_mutation_power(emitter.mutation_power)?;
                    if !emitter.overflow_factor.is_finite() || emitter.overflow_factor < 1.0 {
                        return Err(ConfigError::InvalidOverflowFactor { emitter: index });
                    }
                    if let Some(parents) = emitter.num_parents
                        && (parents == 0 || parents > emitter.population_size)
                    {
                        return Err(ConfigError::InvalidParentCount { emitter: index });
                    }
                }
            }
            AlgorithmConfig::MapElites(cfg) => {
                if cfg.initial_population == 0 {
                    return Err(ConfigError::InvalidInitialPopulation);
                }
                validate_mutation_power(cfg.mutation_power)?;
            }
            AlgorithmConfig::MapElitesLine(cfg) => {
                if cfg.initial_population == 0 {
                    return Err(ConfigError::InvalidInitialPopulation);
                }
                validate_mutation_power(cfg.mutation_power)?;
                validate_mutation_power(cfg.mutation_power_2)?;
            }
        }

        Ok(())
    }
}

fn validate_mutation_power(power: f64) -> Result<(), ConfigError> {
    if !power.is_finite() || power <= 0.0 {
        return Err(ConfigError::InvalidMutationPower);
    }
    Ok(())
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Number of parameters must be non-zero")]
    InvalidNumParams,
    #[error("Evaluation budget must be non-zero")]
    InvalidBudget,
    #[error("Archive-based algorithms require at least one feature definition")]
    MissingFeatures,
    #[error("Map start and end sizes must be non-zero")]
    InvalidMapSize,
    #[error("Feature '{0}' has an empty or inverted range")]
    InvalidFeatureRange(String),
    #[error("Mutation power must be positive and finite")]
    InvalidMutationPower,
    #[error("Population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),
    #[error("Elite count must be non-zero")]
    InvalidEliteCount,
    #[error("Elite count {elites} exceeds population size {population}")]
    TooManyElites { elites: usize, population: usize },
    #[error("CMA-ME requires at least one emitter")]
    NoEmitters,
    #[error("Emitter {emitter} has a zero count")]
    InvalidEmitterCount { emitter: usize },
    #[error("Emitter {emitter} overflow factor must be at least 1.0")]
    InvalidOverflowFactor { emitter: usize },
    #[error("Emitter {emitter} parent count must be in 1..=population_size")]
    InvalidParentCount { emitter: usize },
    #[error("Initial population must be non-zero")]
    InvalidInitialPopulation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_params_rejected() {
        let config = ExperimentConfig {
            num_params: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNumParams)
        ));
    }

    #[test]
    fn test_missing_features_rejected() {
        let mut config = ExperimentConfig::default();
        config.map.features.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingFeatures)
        ));
    }

    #[test]
    fn test_plain_cma_es_ignores_map() {
        // CMA-ES has no archive, so an empty feature list is fine.
        let mut config = ExperimentConfig {
            algorithm: AlgorithmConfig::CmaEs(CmaEsConfig::default()),
            ..Default::default()
        };
        config.map.features.clear();
        assert!(config.validate().is_ok());
        assert!(!config.uses_archive());
    }

    #[test]
    fn test_inverted_feature_range_rejected() {
        let mut config = ExperimentConfig::default();
        config.map.features[0].min_value = 10.0;
        config.map.features[0].max_value = -10.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFeatureRange(_))
        ));
    }

    #[test]
    fn test_empty_emitter_pool_rejected() {
        let config = ExperimentConfig {
            algorithm: AlgorithmConfig::CmaMe(CmaMeConfig { emitters: vec![] }),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoEmitters)));
    }

    #[test]
    fn test_overflow_factor_below_one_rejected() {
        let config = ExperimentConfig {
            algorithm: AlgorithmConfig::CmaMe(CmaMeConfig {
                emitters: vec![EmitterConfig {
                    overflow_factor: 0.5,
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOverflowFactor { emitter: 0 })
        ));
    }

    #[test]
    fn test_algorithm_tag_round_trip() {
        let config = ExperimentConfig {
            algorithm: AlgorithmConfig::MapElitesLine(MapElitesLineConfig::default()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"MapElitesLine\""));

        let back: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.algorithm, AlgorithmConfig::MapElitesLine(_)));
    }

    #[test]
    fn test_unknown_algorithm_tag_fails_to_parse() {
        let json = r#"{
            "num_params": 5,
            "num_to_evaluate": 100,
            "algorithm": { "type": "SimulatedAnnealing" }
        }"#;
        assert!(serde_json::from_str::<ExperimentConfig>(json).is_err());
    }

    #[test]
    fn test_emitter_defaults_fill_in() {
        let json = r#"{
            "num_params": 10,
            "num_to_evaluate": 1000,
            "algorithm": {
                "type": "CmaMe",
                "emitters": [{ "type": "Optimizing" }]
            },
            "map": {
                "features": [
                    { "name": "FirstHalfSum", "min_value": -25.6, "max_value": 25.6 }
                ]
            }
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        let AlgorithmConfig::CmaMe(cma_me) = &config.algorithm else {
            panic!("expected CmaMe");
        };
        assert_eq!(cma_me.emitters[0].kind, EmitterKind::Optimizing);
        assert_eq!(cma_me.emitters[0].population_size, 37);
        assert_eq!(cma_me.emitters[0].overflow_factor, 1.0);
        assert_eq!(config.map.kind, MapKind::Sliding);
    }
}
