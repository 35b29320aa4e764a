//! Behavioral simulation: scripted input against the generated logic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::DimensionReport;
use crate::abstractions::{SimulationSandbox, SyntheticInput};
use crate::content::SourceFile;
use crate::error::{FactoryError, Result};
use crate::spec::ArtifactSpecification;

const SUCCESS_SHARE: f64 = 40.0;
const FAILURE_SHARE: f64 = 30.0;
const THROUGHPUT_SHARE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationPlan {
    /// Synthetic input events per run
    pub input_count: usize,
    /// Ticks the sandbox may simulate
    pub tick_budget: u64,
    /// Ticks per wall-clock second considered fast enough
    pub min_ticks_per_second: f64,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            input_count: 100,
            tick_budget: 3_600,
            min_ticks_per_second: 240.0,
        }
    }
}

/// Deterministic input script for a spec.
///
/// Events are spread evenly over the tick budget and drawn only from the
/// spec's declared inputs; the RNG is seeded from the spec id so a given
/// spec always gets the same script.
pub fn synthetic_inputs(spec: &ArtifactSpecification, plan: &SimulationPlan) -> Vec<SyntheticInput> {
    let inputs = &spec.behavior.inputs;
    if inputs.is_empty() || plan.input_count == 0 {
        return Vec::new();
    }

    let digest = Sha256::digest(spec.id.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

    let spacing = (plan.tick_budget / plan.input_count as u64).max(1);
    (0..plan.input_count as u64)
        .map(|i| SyntheticInput {
            tick: (i * spacing + rng.random_range(0..spacing)).min(plan.tick_budget),
            input: inputs[rng.random_range(0..inputs.len())],
            x: rng.random_range(0.0..1.0),
            y: rng.random_range(0.0..1.0),
        })
        .collect()
}

pub struct BehavioralChecker {
    sandbox: Arc<dyn SimulationSandbox>,
    plan: SimulationPlan,
}

impl BehavioralChecker {
    pub fn new(sandbox: Arc<dyn SimulationSandbox>) -> Self {
        Self {
            sandbox,
            plan: SimulationPlan::default(),
        }
    }

    pub fn with_plan(mut self, plan: SimulationPlan) -> Self {
        self.plan = plan;
        self
    }

    pub async fn check(
        &self,
        spec: &ArtifactSpecification,
        files: &[SourceFile],
    ) -> Result<DimensionReport> {
        let script = synthetic_inputs(spec, &self.plan);
        let report = self
            .sandbox
            .run_simulation(files, &script, self.plan.tick_budget)
            .await
            .map_err(|e| match e {
                FactoryError::ValidatorInfrastructure { .. } => e,
                other => {
                    FactoryError::validator_infrastructure(format!("sandbox unavailable: {}", other))
                }
            })?;

        if report.crashed {
            let at = report
                .crash_tick
                .map(|t| format!(" at tick {}", t))
                .unwrap_or_default();
            return Ok(DimensionReport::new(0.0, vec![format!("simulation crashed{}", at)]));
        }

        let mut score = 0.0;
        let mut findings = Vec::new();

        if report.reached_success {
            score += SUCCESS_SHARE;
        } else {
            findings.push(format!(
                "success condition not reached within {} ticks: {}",
                self.plan.tick_budget, spec.behavior.success_condition
            ));
        }
        if report.reached_failure {
            score += FAILURE_SHARE;
        } else {
            findings.push(format!(
                "failure condition never triggered: {}",
                spec.behavior.failure_condition
            ));
        }

        let ratio = if self.plan.min_ticks_per_second > 0.0 {
            (report.ticks_per_second / self.plan.min_ticks_per_second).clamp(0.0, 1.0)
        } else {
            1.0
        };
        score += THROUGHPUT_SHARE * ratio;
        if ratio < 1.0 {
            findings.push(format!(
                "throughput {:.0} ticks/s below {:.0}",
                report.ticks_per_second, self.plan.min_ticks_per_second
            ));
        }

        Ok(DimensionReport::new(score, findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::SimulationReport;
    use crate::spec::InteractionInput;
    use crate::testing::{sample_logic_files, StubSandbox};

    fn healthy() -> SimulationReport {
        SimulationReport {
            crashed: false,
            crash_tick: None,
            reached_success: true,
            reached_failure: true,
            ticks_per_second: 1_000.0,
        }
    }

    #[test]
    fn test_inputs_come_from_declared_set() {
        let mut spec = ArtifactSpecification::default_spec(10);
        spec.behavior.inputs = vec![InteractionInput::Swipe, InteractionInput::LongPress];
        let plan = SimulationPlan::default();
        let script = synthetic_inputs(&spec, &plan);

        assert_eq!(script.len(), 100);
        assert!(script.iter().all(|e| spec.behavior.inputs.contains(&e.input)));
        assert!(script.windows(2).all(|w| w[0].tick <= w[1].tick));
        assert!(script.iter().all(|e| e.tick <= plan.tick_budget));
        assert_eq!(script, synthetic_inputs(&spec, &plan));
    }

    #[tokio::test]
    async fn test_healthy_run_scores_full() {
        let checker = BehavioralChecker::new(Arc::new(StubSandbox::new(healthy())));
        let spec = ArtifactSpecification::default_spec(10);
        let report = checker.check(&spec, &sample_logic_files()).await.unwrap();
        assert_eq!(report.score, 100.0);
    }

    #[tokio::test]
    async fn test_crash_forces_zero_regardless_of_reachability() {
        let crashed = SimulationReport {
            crashed: true,
            crash_tick: Some(3),
            ..healthy()
        };
        let checker = BehavioralChecker::new(Arc::new(StubSandbox::new(crashed)));
        let spec = ArtifactSpecification::default_spec(10);
        let report = checker.check(&spec, &sample_logic_files()).await.unwrap();
        assert_eq!(report.score, 0.0);
        assert_eq!(report.findings, vec!["simulation crashed at tick 3"]);
    }

    #[tokio::test]
    async fn test_partial_reachability_and_slow_throughput() {
        let slow = SimulationReport {
            reached_failure: false,
            ticks_per_second: 120.0,
            ..healthy()
        };
        let checker = BehavioralChecker::new(Arc::new(StubSandbox::new(slow)));
        let spec = ArtifactSpecification::default_spec(10);
        let report = checker.check(&spec, &sample_logic_files()).await.unwrap();
        // 40 success + 0 failure + 15 throughput
        assert!((report.score - 55.0).abs() < 1e-9);
        assert_eq!(report.findings.len(), 2);
    }
}
