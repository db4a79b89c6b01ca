use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use config::ConfigError;

use crate::application::{AnalysisConfig, CacheConfig, SamplingPolicy};
use crate::domain::{
    AnalysisError, ChunkSize, ExtremesFraction, FanOut, SampleTarget, ThresholdCount,
    TierThresholds,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub cache: CacheSettings,
    pub comparison: ComparisonSettings,
    pub records: RecordsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisSettings {
    pub sample_threshold: usize,
    pub hierarchical_threshold: usize,
    pub sample_target: usize,
    pub chunk_max_size: usize,
    pub chunk_fan_out: usize,
    pub summarizer_timeout_ms: u64,
    pub extremes_fraction: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_entries: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComparisonSettings {
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecordsSettings {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::load(Path::new("config"), &environment)
    }

    /// Load layered settings from `dir`, with `environment` picking the overlay file
    pub fn load(dir: &Path, environment: &str) -> Result<Self, ConfigError> {
        let layer = |name: &str| File::from(dir.join(name)).required(false);

        let config = Config::builder()
            // Start with default values
            .set_default("analysis.sample_threshold", 50)?
            .set_default("analysis.hierarchical_threshold", 120)?
            .set_default("analysis.sample_target", 50)?
            .set_default("analysis.chunk_max_size", 40)?
            .set_default("analysis.chunk_fan_out", 4)?
            .set_default("analysis.summarizer_timeout_ms", 60_000)?
            .set_default("analysis.extremes_fraction", 0.3)?
            .set_default("cache.ttl_secs", 900)?
            .set_default("cache.max_entries", 1_000)?
            .set_default("comparison.debounce_ms", 500)?
            .set_default("records.path", "data/calls.json")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Add configuration files if they exist
            .add_source(layer("default"))
            .add_source(layer(environment))
            .add_source(layer("local"))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("TREND_COACH").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Validated tuning for the analysis pipeline
    pub fn analysis_config(&self) -> Result<AnalysisConfig, AnalysisError> {
        let analysis = &self.analysis;
        let config = AnalysisConfig {
            thresholds: TierThresholds::try_new(
                ThresholdCount::new(analysis.sample_threshold),
                ThresholdCount::new(analysis.hierarchical_threshold),
            )?,
            sample_target: SampleTarget::try_new(analysis.sample_target)
                .map_err(|e| invalid("analysis.sample_target", e))?,
            sampling: SamplingPolicy {
                extremes_fraction: ExtremesFraction::try_new(analysis.extremes_fraction)
                    .map_err(|e| invalid("analysis.extremes_fraction", e))?,
            },
            chunk_size: ChunkSize::try_new(analysis.chunk_max_size)
                .map_err(|e| invalid("analysis.chunk_max_size", e))?,
            fan_out: FanOut::try_new(analysis.chunk_fan_out)
                .map_err(|e| invalid("analysis.chunk_fan_out", e))?,
            summarizer_timeout: Duration::from_millis(analysis.summarizer_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            time_to_live: Duration::from_secs(self.cache.ttl_secs),
            max_entries: self.cache.max_entries,
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.comparison.debounce_ms)
    }
}

fn invalid(key: &str, error: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Configuration(format!("{key}: {error}"))
}
