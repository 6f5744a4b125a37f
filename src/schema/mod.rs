//! Schema module - Experiment configuration types for quality-diversity search.

mod config;

pub use config::*;
