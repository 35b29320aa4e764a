//! Per-request generation settings.
//!
//! A `GenerationConfig` is passed by value into every
//! [`GenerationOrchestrator::generate`](crate::orchestrator::GenerationOrchestrator::generate)
//! call, so any field can be overridden for a single request.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::quality::QualityThresholds;
use crate::retry::{BackoffStrategy, RetryConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum attempts of the content/validation loop.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Overall score an attempt needs to be accepted (0-100).
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,

    /// Cumulative cost ceiling for one request.
    #[serde(default = "default_cost_budget")]
    pub cost_budget: f64,

    /// Substitute a baseline artifact when no attempt is accepted.
    #[serde(default = "default_enable_fallback")]
    pub enable_fallback: bool,

    #[serde(default)]
    pub dimension_thresholds: DimensionThresholds,

    /// Relaxed acceptance applied to the final permitted attempt.
    #[serde(default)]
    pub last_chance: LastChancePolicy,

    /// Continue with a built-in default spec when spec generation fails.
    #[serde(default)]
    pub proceed_with_default_spec: bool,

    /// Delay between attempts.
    #[serde(default = "default_attempt_backoff")]
    pub backoff: RetryConfig,

    /// Retry policy for transient collaborator failures inside one call.
    #[serde(default = "default_collaborator_retry")]
    pub collaborator_retry: RetryConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Up-front cost estimate for one attempt. Zero means "use the cost of
    /// the previous attempt", which skips the projection before attempt 1.
    #[serde(default)]
    pub estimated_attempt_cost: f64,

    /// Local retries when the spec response is malformed.
    #[serde(default = "default_spec_parse_retries")]
    pub spec_parse_retries: u32,

    /// Exact number of stages every specification must carry.
    #[serde(default = "default_stage_count")]
    pub stage_count: usize,

    /// Novelty similarity at or above which a warning is logged.
    #[serde(default = "default_novelty_warn_threshold")]
    pub novelty_warn_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionThresholds {
    #[serde(default = "default_structural_threshold")]
    pub structural: f64,
    #[serde(default = "default_behavioral_threshold")]
    pub behavioral: f64,
    #[serde(default = "default_visual_threshold")]
    pub visual: f64,
}

impl Default for DimensionThresholds {
    fn default() -> Self {
        Self {
            structural: default_structural_threshold(),
            behavioral: default_behavioral_threshold(),
            visual: default_visual_threshold(),
        }
    }
}

/// Acceptance bar for the last permitted attempt.
///
/// An attempt that misses the strict gates is still accepted on the final
/// try when its overall score reaches `min_overall` and its structural
/// score shows the build compiles (`min_structural`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastChancePolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_last_chance_overall")]
    pub min_overall: f64,
    #[serde(default = "default_last_chance_structural")]
    pub min_structural: f64,
}

impl Default for LastChancePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_overall: default_last_chance_overall(),
            min_structural: default_last_chance_structural(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_spec_call", with = "humantime_serde")]
    pub spec_call: Duration,
    #[serde(default = "default_logic_call", with = "humantime_serde")]
    pub logic_call: Duration,
    #[serde(default = "default_image_call", with = "humantime_serde")]
    pub image_call: Duration,
    #[serde(default = "default_validation", with = "humantime_serde")]
    pub validation: Duration,
    /// Deadline for the whole request, if any.
    #[serde(default, with = "humantime_serde")]
    pub request: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            spec_call: default_spec_call(),
            logic_call: default_logic_call(),
            image_call: default_image_call(),
            validation: default_validation(),
            request: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_quality_score: default_min_quality_score(),
            cost_budget: default_cost_budget(),
            enable_fallback: default_enable_fallback(),
            dimension_thresholds: DimensionThresholds::default(),
            last_chance: LastChancePolicy::default(),
            proceed_with_default_spec: false,
            backoff: default_attempt_backoff(),
            collaborator_retry: default_collaborator_retry(),
            timeouts: TimeoutConfig::default(),
            estimated_attempt_cost: 0.0,
            spec_parse_retries: default_spec_parse_retries(),
            stage_count: default_stage_count(),
            novelty_warn_threshold: default_novelty_warn_threshold(),
        }
    }
}

impl GenerationConfig {
    /// Thresholds handed to the quality validator
    pub fn quality_thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            overall: self.min_quality_score,
            structural: self.dimension_thresholds.structural,
            behavioral: self.dimension_thresholds.behavioral,
            visual: self.dimension_thresholds.visual,
        }
    }

    /// Collect every invalid field instead of stopping at the first one
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_retries == 0 {
            errors.push("generation.max_retries must be at least 1".to_string());
        }
        let scores = [
            ("generation.min_quality_score", self.min_quality_score),
            (
                "generation.dimension_thresholds.structural",
                self.dimension_thresholds.structural,
            ),
            (
                "generation.dimension_thresholds.behavioral",
                self.dimension_thresholds.behavioral,
            ),
            (
                "generation.dimension_thresholds.visual",
                self.dimension_thresholds.visual,
            ),
            ("generation.last_chance.min_overall", self.last_chance.min_overall),
            (
                "generation.last_chance.min_structural",
                self.last_chance.min_structural,
            ),
        ];
        for (path, value) in scores {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("{} must be between 0 and 100, got {}", path, value));
            }
        }
        if !(self.cost_budget > 0.0) {
            errors.push(format!(
                "generation.cost_budget must be positive, got {}",
                self.cost_budget
            ));
        }
        if self.estimated_attempt_cost < 0.0 {
            errors.push("generation.estimated_attempt_cost cannot be negative".to_string());
        }
        if self.stage_count == 0 {
            errors.push("generation.stage_count must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.novelty_warn_threshold) {
            errors.push("generation.novelty_warn_threshold must be between 0 and 1".to_string());
        }
        if self.backoff.max_delay < self.backoff.initial_delay {
            errors.push("generation.backoff.max_delay is shorter than initial_delay".to_string());
        }

        errors
    }
}

// Default value functions for serde
fn default_max_retries() -> u32 {
    5
}

fn default_min_quality_score() -> f64 {
    70.0
}

fn default_cost_budget() -> f64 {
    5.0
}

fn default_enable_fallback() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_structural_threshold() -> f64 {
    90.0
}

fn default_behavioral_threshold() -> f64 {
    85.0
}

fn default_visual_threshold() -> f64 {
    85.0
}

fn default_last_chance_overall() -> f64 {
    60.0
}

fn default_last_chance_structural() -> f64 {
    50.0
}

fn default_attempt_backoff() -> RetryConfig {
    RetryConfig {
        attempts: 1,
        backoff: BackoffStrategy::Exponential { base: 2.0 },
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
        jitter: false,
        jitter_factor: 0.3,
    }
}

fn default_collaborator_retry() -> RetryConfig {
    RetryConfig {
        attempts: 3,
        backoff: BackoffStrategy::Exponential { base: 2.0 },
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(8),
        jitter: true,
        jitter_factor: 0.3,
    }
}

fn default_spec_call() -> Duration {
    Duration::from_secs(120)
}

fn default_logic_call() -> Duration {
    Duration::from_secs(180)
}

fn default_image_call() -> Duration {
    Duration::from_secs(90)
}

fn default_validation() -> Duration {
    Duration::from_secs(300)
}

fn default_spec_parse_retries() -> u32 {
    3
}

fn default_stage_count() -> usize {
    10
}

fn default_novelty_warn_threshold() -> f64 {
    0.80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.min_quality_score, 70.0);
        assert_eq!(config.cost_budget, 5.0);
        assert!(config.enable_fallback);
        assert_eq!(config.dimension_thresholds.structural, 90.0);
        assert_eq!(config.dimension_thresholds.behavioral, 85.0);
        assert_eq!(config.dimension_thresholds.visual, 85.0);
        assert_eq!(config.stage_count, 10);
        assert!(config.validation_errors().is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
max_retries: 2
cost_budget: 1.5
dimension_thresholds:
  visual: 60
timeouts:
  logic_call: 30s
  request: 10m
"#;
        let config: GenerationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.cost_budget, 1.5);
        assert_eq!(config.dimension_thresholds.visual, 60.0);
        assert_eq!(config.dimension_thresholds.structural, 90.0);
        assert_eq!(config.timeouts.logic_call, Duration::from_secs(30));
        assert_eq!(config.timeouts.request, Some(Duration::from_secs(600)));
        assert_eq!(config.timeouts.spec_call, Duration::from_secs(120));
        assert!(config.enable_fallback);
    }

    #[test]
    fn test_validation_accumulates_errors() {
        let config = GenerationConfig {
            max_retries: 0,
            cost_budget: 0.0,
            min_quality_score: 140.0,
            stage_count: 0,
            ..Default::default()
        };
        let errors = config.validation_errors();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("max_retries")));
        assert!(errors.iter().any(|e| e.contains("cost_budget")));
        assert!(errors.iter().any(|e| e.contains("min_quality_score")));
        assert!(errors.iter().any(|e| e.contains("stage_count")));
    }

    #[test]
    fn test_quality_thresholds_projection() {
        let config = GenerationConfig {
            min_quality_score: 75.0,
            ..Default::default()
        };
        let thresholds = config.quality_thresholds();
        assert_eq!(thresholds.overall, 75.0);
        assert_eq!(thresholds.behavioral, 85.0);
    }
}
