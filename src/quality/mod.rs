//! Quality validation.
//!
//! Three independent dimension checks run concurrently and reduce to one
//! [`QualityScore`]. A low score is a normal outcome; `Err` is reserved for
//! tooling that cannot run at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

use crate::config::LastChancePolicy;
use crate::content::ArtifactPayload;
use crate::error::{FactoryError, Result};
use crate::spec::ArtifactSpecification;

pub mod behavioral;
pub mod structural;
pub mod visual;

pub use behavioral::BehavioralChecker;
pub use structural::StructuralChecker;
pub use visual::VisualChecker;

pub const STRUCTURAL_WEIGHT: f64 = 0.40;
pub const BEHAVIORAL_WEIGHT: f64 = 0.35;
pub const VISUAL_WEIGHT: f64 = 0.25;

/// Weighted overall score from the three dimensions
pub fn weighted_overall(structural: f64, behavioral: f64, visual: f64) -> f64 {
    STRUCTURAL_WEIGHT * structural + BEHAVIORAL_WEIGHT * behavioral + VISUAL_WEIGHT * visual
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub overall: f64,
    pub structural: f64,
    pub behavioral: f64,
    pub visual: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            overall: 70.0,
            structural: 90.0,
            behavioral: 85.0,
            visual: 85.0,
        }
    }
}

/// One dimension's score with the reasons it lost points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionReport {
    pub score: f64,
    #[serde(default)]
    pub findings: Vec<String>,
}

impl DimensionReport {
    pub fn new(score: f64, findings: Vec<String>) -> Self {
        Self {
            score: score.clamp(0.0, 100.0),
            findings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub structural: f64,
    pub behavioral: f64,
    pub visual: f64,
    pub overall: f64,
    pub structural_pass: bool,
    pub behavioral_pass: bool,
    pub visual_pass: bool,
    /// Overall threshold and every dimension threshold met
    pub passed: bool,
    /// Why points were lost, prefixed by dimension
    #[serde(default)]
    pub findings: Vec<String>,
}

impl QualityScore {
    /// Build a score from dimension values, clamping each to [0, 100]
    pub fn from_dimensions(
        structural: f64,
        behavioral: f64,
        visual: f64,
        thresholds: &QualityThresholds,
    ) -> Self {
        let structural = structural.clamp(0.0, 100.0);
        let behavioral = behavioral.clamp(0.0, 100.0);
        let visual = visual.clamp(0.0, 100.0);
        let overall = weighted_overall(structural, behavioral, visual).clamp(0.0, 100.0);

        let structural_pass = structural >= thresholds.structural;
        let behavioral_pass = behavioral >= thresholds.behavioral;
        let visual_pass = visual >= thresholds.visual;
        Self {
            structural,
            behavioral,
            visual,
            overall,
            structural_pass,
            behavioral_pass,
            visual_pass,
            passed: overall >= thresholds.overall
                && structural_pass
                && behavioral_pass
                && visual_pass,
            findings: Vec::new(),
        }
    }

    /// Score every dimension equally; handy for stubs
    pub fn uniform(score: f64, thresholds: &QualityThresholds) -> Self {
        Self::from_dimensions(score, score, score, thresholds)
    }

    /// Automatic result for an attempt whose content never reached validation
    pub fn zero(reason: impl Into<String>, thresholds: &QualityThresholds) -> Self {
        Self::uniform(0.0, thresholds).with_findings(vec![reason.into()])
    }

    pub fn with_findings(mut self, findings: Vec<String>) -> Self {
        self.findings = findings;
        self
    }

    /// Relaxed acceptance for the final attempt: the overall bar is lower
    /// and dimension thresholds are ignored, but the build must compile
    pub fn meets_last_chance(&self, policy: &LastChancePolicy) -> bool {
        policy.enabled
            && self.overall >= policy.min_overall
            && self.structural >= policy.min_structural
    }

    /// Human-readable gate failures, for retry feedback
    pub fn gate_failures(&self, thresholds: &QualityThresholds) -> Vec<String> {
        let mut failures = Vec::new();
        let dims = [
            ("structural", self.structural, thresholds.structural, self.structural_pass),
            ("behavioral", self.behavioral, thresholds.behavioral, self.behavioral_pass),
            ("visual", self.visual, thresholds.visual, self.visual_pass),
        ];
        for (name, score, threshold, pass) in dims {
            if !pass {
                failures.push(format!("{} score {:.1} below {:.1}", name, score, threshold));
            }
        }
        if self.overall < thresholds.overall {
            failures.push(format!(
                "overall score {:.1} below {:.1}",
                self.overall, thresholds.overall
            ));
        }
        failures
    }
}

/// Validator seam; stubs implement this to script scores
#[async_trait]
pub trait QualityGate: Send + Sync {
    async fn validate(
        &self,
        spec: &ArtifactSpecification,
        payload: &ArtifactPayload,
        thresholds: &QualityThresholds,
    ) -> Result<QualityScore>;
}

/// Runs the three dimension checkers concurrently
pub struct QualityValidator {
    structural: StructuralChecker,
    behavioral: BehavioralChecker,
    visual: VisualChecker,
    timeout: Duration,
}

impl QualityValidator {
    pub fn new(
        structural: StructuralChecker,
        behavioral: BehavioralChecker,
        visual: VisualChecker,
        timeout: Duration,
    ) -> Self {
        Self {
            structural,
            behavioral,
            visual,
            timeout,
        }
    }

    async fn run(
        &self,
        spec: &ArtifactSpecification,
        payload: &ArtifactPayload,
        thresholds: &QualityThresholds,
    ) -> Result<QualityScore> {
        let (structural, behavioral) = tokio::join!(
            self.structural.check(&payload.logic.files),
            self.behavioral.check(spec, &payload.logic.files),
        );
        let structural = structural?;
        let behavioral = behavioral?;
        let visual = self.visual.check(spec, &payload.theme, &payload.assets);

        let mut findings = Vec::new();
        for (dimension, report) in [
            ("structural", &structural),
            ("behavioral", &behavioral),
            ("visual", &visual),
        ] {
            findings.extend(report.findings.iter().map(|f| format!("{}: {}", dimension, f)));
        }

        let score = QualityScore::from_dimensions(
            structural.score,
            behavioral.score,
            visual.score,
            thresholds,
        )
        .with_findings(findings);

        debug!(
            structural = score.structural,
            behavioral = score.behavioral,
            visual = score.visual,
            overall = score.overall,
            passed = score.passed,
            "Validation complete"
        );
        Ok(score)
    }
}

#[async_trait]
impl QualityGate for QualityValidator {
    async fn validate(
        &self,
        spec: &ArtifactSpecification,
        payload: &ArtifactPayload,
        thresholds: &QualityThresholds,
    ) -> Result<QualityScore> {
        let span = info_span!("validation", spec_id = %spec.id);
        match tokio::time::timeout(self.timeout, self.run(spec, payload, thresholds).instrument(span))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FactoryError::validator_timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overall_is_weighted_sum() {
        let score = QualityScore::from_dimensions(100.0, 50.0, 20.0, &QualityThresholds::default());
        assert!((score.overall - (40.0 + 17.5 + 5.0)).abs() < 1e-9);
        assert!(!score.passed);
        assert!(score.structural_pass);
        assert!(!score.behavioral_pass);
    }

    #[test]
    fn test_pass_requires_every_dimension() {
        let thresholds = QualityThresholds::default();
        // overall 88.25 clears 70 but visual 60 misses 85
        let score = QualityScore::from_dimensions(100.0, 95.0, 60.0, &thresholds);
        assert!(score.overall >= thresholds.overall);
        assert!(!score.passed);
        assert_eq!(score.gate_failures(&thresholds), vec!["visual score 60.0 below 85.0"]);

        assert!(QualityScore::uniform(90.0, &thresholds).passed);
    }

    #[test]
    fn test_last_chance_needs_compiling_build() {
        let policy = LastChancePolicy::default();
        let thresholds = QualityThresholds::default();
        assert!(QualityScore::from_dimensions(70.0, 60.0, 50.0, &thresholds).meets_last_chance(&policy));
        // overall 68 but structural 20 means it does not build
        assert!(!QualityScore::from_dimensions(20.0, 100.0, 100.0, &thresholds).meets_last_chance(&policy));
        let disabled = LastChancePolicy {
            enabled: false,
            ..policy
        };
        assert!(!QualityScore::uniform(65.0, &thresholds).meets_last_chance(&disabled));
    }

    #[test]
    fn test_zero_score_records_reason() {
        let score = QualityScore::zero("logic generator failed", &QualityThresholds::default());
        assert_eq!(score.overall, 0.0);
        assert_eq!(score.findings, vec!["logic generator failed"]);
    }

    proptest! {
        #[test]
        fn overall_matches_weights_and_stays_in_range(
            s in -50.0f64..150.0, b in -50.0f64..150.0, v in -50.0f64..150.0
        ) {
            let score = QualityScore::from_dimensions(s, b, v, &QualityThresholds::default());
            let expected = 0.40 * score.structural + 0.35 * score.behavioral + 0.25 * score.visual;
            prop_assert!((score.overall - expected).abs() < 1e-9);
            prop_assert!((0.0..=100.0).contains(&score.overall));
        }
    }
}
