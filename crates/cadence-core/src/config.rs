//! Engine configuration
//!
//! ## Configuration Resolution
//!
//! 1. Explicit path passed by the caller (`--config`)
//! 2. Override in data dir (~/.local/share/cadence/config/engine.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! `CADENCE_ENRICHMENT_TIMEOUT_MS` and `CADENCE_ENRICHMENT_MAX_RESULTS` are
//! applied on top of whichever file was used.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

pub const ENRICHMENT_TIMEOUT_ENV: &str = "CADENCE_ENRICHMENT_TIMEOUT_MS";
pub const ENRICHMENT_MAX_RESULTS_ENV: &str = "CADENCE_ENRICHMENT_MAX_RESULTS";

/// Tunables for the engine. Rule weights, thresholds and cooldowns are not
/// configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on one knowledge lookup
    pub enrichment_timeout: Duration,
    /// Facts requested per lookup
    pub enrichment_max_results: usize,
    /// Confidence at or above which a prediction is surfaced for notification
    pub high_confidence_min: f64,
    /// Default wellbeing history window
    pub history_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enrichment_timeout: Duration::from_millis(2000),
            enrichment_max_results: 3,
            high_confidence_min: 0.8,
            history_days: 30,
        }
    }
}

impl EngineConfig {
    /// Resolve config from an explicit path, the data dir override, or embedded defaults
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let content = match override_path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?,
                None => DEFAULT_CONFIG.to_string(),
            },
        };

        let config = parse_config(&content)?;
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENRICHMENT_TIMEOUT_ENV) {
            let ms: u64 = value.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be an integer, got {}", ENRICHMENT_TIMEOUT_ENV, value))
            })?;
            self.enrichment_timeout = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENRICHMENT_MAX_RESULTS_ENV) {
            self.enrichment_max_results = value.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be an integer, got {}",
                    ENRICHMENT_MAX_RESULTS_ENV, value
                ))
            })?;
        }
        Ok(self)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cadence").join("config").join("engine.toml"))
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    enrichment: Option<RawEnrichment>,
    predictions: Option<RawPredictions>,
    history: Option<RawHistory>,
}

#[derive(Debug, Deserialize)]
struct RawEnrichment {
    timeout_ms: Option<u64>,
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawPredictions {
    high_confidence_min: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    days: Option<u32>,
}

fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(enrichment) = raw.enrichment {
        if let Some(ms) = enrichment.timeout_ms {
            config.enrichment_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = enrichment.max_results {
            config.enrichment_max_results = max;
        }
    }

    if let Some(predictions) = raw.predictions {
        if let Some(min) = predictions.high_confidence_min {
            if !(0.0..=1.0).contains(&min) {
                return Err(Error::Config(format!(
                    "high_confidence_min must be within [0, 1], got {}",
                    min
                )));
            }
            config.high_confidence_min = min;
        }
    }

    if let Some(days) = raw.history.and_then(|h| h.days) {
        config.history_days = days;
    }

    Ok(config)
}
