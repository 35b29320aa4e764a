//! Configuration for the generation pipeline.
//!
//! Values are layered, lowest to highest precedence:
//!
//! 1. Hardcoded defaults
//! 2. A config file (`.yml`/`.yaml` or `.toml`)
//! 3. Environment variables (`GAMEFACTORY_*` prefix)
//!
//! Validation reports every invalid field at once.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ErrorCode, FactoryError, Result};

pub mod generation;

pub use generation::{DimensionThresholds, GenerationConfig, LastChancePolicy, TimeoutConfig};

/// Valid log levels for configuration validation.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "GAMEFACTORY_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root directory the filesystem sink writes artifacts under.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// JSON file holding prior spec summaries.
    #[serde(default)]
    pub history_path: Option<PathBuf>,

    /// Upper bound on generation requests processed at once by a batch.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            output_dir: default_output_dir(),
            history_path: None,
            max_concurrent_requests: default_max_concurrent(),
            generation: GenerationConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_max_concurrent() -> usize {
    4
}

impl FactoryConfig {
    /// Load from an optional file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load with an injectable environment lookup
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, choosing the format from its extension
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FactoryError::config_with_code(
                ErrorCode::CONFIG_NOT_FOUND,
                format!("Configuration file not found: {}", path.display()),
            ));
        }
        let content = std::fs::read_to_string(path)?;
        debug!("Loading configuration from {}", path.display());

        let parse_error = |e: String| {
            FactoryError::config_with_code(
                ErrorCode::CONFIG_PARSE,
                format!("{}: {}", path.display(), e),
            )
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            Some("yml") | Some("yaml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
            other => Err(FactoryError::config_with_code(
                ErrorCode::CONFIG_PARSE,
                format!("Unsupported configuration format: {:?}", other),
            )),
        }
    }

    /// Apply `GAMEFACTORY_*` overrides
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(&format!("{}{}", ENV_PREFIX, name));
        let mut errors = Vec::new();

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Some(dir) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("HISTORY_PATH") {
            self.history_path = Some(PathBuf::from(path));
        }
        parse_into(
            var("MAX_CONCURRENT_REQUESTS"),
            "MAX_CONCURRENT_REQUESTS",
            &mut self.max_concurrent_requests,
            &mut errors,
        );

        let generation = &mut self.generation;
        parse_into(var("MAX_RETRIES"), "MAX_RETRIES", &mut generation.max_retries, &mut errors);
        parse_into(
            var("MIN_QUALITY_SCORE"),
            "MIN_QUALITY_SCORE",
            &mut generation.min_quality_score,
            &mut errors,
        );
        parse_into(var("COST_BUDGET"), "COST_BUDGET", &mut generation.cost_budget, &mut errors);
        parse_into(
            var("ENABLE_FALLBACK"),
            "ENABLE_FALLBACK",
            &mut generation.enable_fallback,
            &mut errors,
        );
        parse_into(
            var("STRUCTURAL_THRESHOLD"),
            "STRUCTURAL_THRESHOLD",
            &mut generation.dimension_thresholds.structural,
            &mut errors,
        );
        parse_into(
            var("BEHAVIORAL_THRESHOLD"),
            "BEHAVIORAL_THRESHOLD",
            &mut generation.dimension_thresholds.behavioral,
            &mut errors,
        );
        parse_into(
            var("VISUAL_THRESHOLD"),
            "VISUAL_THRESHOLD",
            &mut generation.dimension_thresholds.visual,
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FactoryError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                errors.join("; "),
            ))
        }
    }

    /// Validate every field, reporting all problems together
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            ));
        }
        if self.max_concurrent_requests == 0 || self.max_concurrent_requests > 64 {
            errors.push("max_concurrent_requests must be between 1 and 64".to_string());
        }
        errors.extend(self.generation.validation_errors());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FactoryError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                errors.join("; "),
            ))
        }
    }

    /// History file location, defaulting under the user's data directory
    pub fn effective_history_path(&self) -> PathBuf {
        self.history_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("gamefactory").join("history.json"))
                .unwrap_or_else(|| PathBuf::from(".gamefactory/history.json"))
        })
    }
}

fn parse_into<T: std::str::FromStr>(
    raw: Option<String>,
    name: &str,
    target: &mut T,
    errors: &mut Vec<String>,
) {
    if let Some(raw) = raw {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => errors.push(format!("{}{} has invalid value '{}'", ENV_PREFIX, name, raw)),
        }
    }
}
