//! Scripted quality validator

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::content::ArtifactPayload;
use crate::error::{FactoryError, Result};
use crate::quality::{QualityGate, QualityScore, QualityThresholds};
use crate::spec::ArtifactSpecification;

#[derive(Debug, Clone)]
enum GateStep {
    Uniform(f64),
    Dimensions(f64, f64, f64),
    Timeout,
    Unavailable(String),
}

/// Returns scripted scores, one step per call.
///
/// The last step repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedGate {
    steps: Mutex<VecDeque<GateStep>>,
    calls: AtomicUsize,
}

impl ScriptedGate {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call scores `score` on all three dimensions
    pub fn always(score: f64) -> Self {
        Self::new().score(score)
    }

    pub fn score(self, score: f64) -> Self {
        self.push(GateStep::Uniform(score))
    }

    pub fn dimensions(self, structural: f64, behavioral: f64, visual: f64) -> Self {
        self.push(GateStep::Dimensions(structural, behavioral, visual))
    }

    /// Validation that overran its deadline
    pub fn timeout(self) -> Self {
        self.push(GateStep::Timeout)
    }

    /// Tooling that could not run
    pub fn unavailable(self, message: impl Into<String>) -> Self {
        self.push(GateStep::Unavailable(message.into()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(self, step: GateStep) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    fn next_step(&self) -> GateStep {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap_or(GateStep::Uniform(0.0))
        } else {
            steps.front().cloned().unwrap_or(GateStep::Uniform(0.0))
        }
    }
}

impl Default for ScriptedGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityGate for ScriptedGate {
    async fn validate(
        &self,
        _spec: &ArtifactSpecification,
        _payload: &ArtifactPayload,
        thresholds: &QualityThresholds,
    ) -> Result<QualityScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            GateStep::Uniform(score) => Ok(QualityScore::uniform(score, thresholds)),
            GateStep::Dimensions(structural, behavioral, visual) => Ok(
                QualityScore::from_dimensions(structural, behavioral, visual, thresholds),
            ),
            GateStep::Timeout => Err(FactoryError::validator_timeout(Duration::from_secs(300))),
            GateStep::Unavailable(message) => Err(FactoryError::validator_infrastructure(message)),
        }
    }
}
