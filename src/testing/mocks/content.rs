//! Content generator stubs for the logic and asset stages

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::content::{AssetBundle, ContentGenerator, ContentStage, LogicBundle};
use crate::error::{FactoryError, FailureKind, Result};
use crate::spec::ArtifactSpecification;
use crate::testing::fixtures::{sample_assets, sample_logic_bundle};

#[derive(Debug, Clone)]
enum LogicStep {
    Bundle(f64),
    Structural(Vec<String>, f64),
    Generation(String),
    Collaborator(FailureKind, String),
}

/// Logic stage stub.
///
/// Scripted steps are consumed one per call; afterwards it keeps returning
/// the sample bundle at the default cost. Feedback passed in is recorded.
#[derive(Debug)]
pub struct StubLogic {
    cost: f64,
    steps: Mutex<VecDeque<LogicStep>>,
    delay: Option<Duration>,
    feedback: Mutex<Vec<Option<String>>>,
}

impl StubLogic {
    pub fn new(cost: f64) -> Self {
        Self {
            cost,
            steps: Mutex::new(VecDeque::new()),
            delay: None,
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn then_bundle(self, cost: f64) -> Self {
        self.push(LogicStep::Bundle(cost))
    }

    /// Output that fails the static shape check after `cost` was spent
    pub fn then_structural(self, violations: Vec<String>, cost: f64) -> Self {
        self.push(LogicStep::Structural(violations, cost))
    }

    pub fn then_generation_error(self, message: impl Into<String>) -> Self {
        self.push(LogicStep::Generation(message.into()))
    }

    pub fn then_collaborator_error(self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.push(LogicStep::Collaborator(kind, message.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Feedback received by each call, in order
    pub fn feedback(&self) -> Vec<Option<String>> {
        self.feedback.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.feedback.lock().unwrap().len()
    }

    fn push(self, step: LogicStep) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }
}

#[async_trait]
impl ContentGenerator<LogicBundle> for StubLogic {
    fn stage(&self) -> ContentStage {
        ContentStage::Logic
    }

    async fn generate(
        &self,
        _spec: &ArtifactSpecification,
        feedback: Option<&str>,
    ) -> Result<LogicBundle> {
        self.feedback
            .lock()
            .unwrap()
            .push(feedback.map(str::to_string));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self.steps.lock().unwrap().pop_front();
        match step.unwrap_or(LogicStep::Bundle(self.cost)) {
            LogicStep::Bundle(cost) => Ok(sample_logic_bundle(cost)),
            LogicStep::Structural(violations, cost) => {
                Err(FactoryError::structural(violations).with_cost(cost))
            }
            LogicStep::Generation(message) => {
                Err(FactoryError::generation(ContentStage::Logic, message))
            }
            LogicStep::Collaborator(kind, message) => {
                Err(FactoryError::collaborator("llm", kind, message))
            }
        }
    }
}

/// Asset stage stub returning full-size images at a fixed cost
#[derive(Debug, Default)]
pub struct StubAssets {
    cost: f64,
    placeholders: bool,
    calls: AtomicUsize,
}

impl StubAssets {
    pub fn new(cost: f64) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    /// Behave as if every image call failed
    pub fn placeholders() -> Self {
        Self {
            placeholders: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator<AssetBundle> for StubAssets {
    fn stage(&self) -> ContentStage {
        ContentStage::Assets
    }

    async fn generate(
        &self,
        spec: &ArtifactSpecification,
        _feedback: Option<&str>,
    ) -> Result<AssetBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.placeholders {
            Ok(AssetBundle::placeholders(spec))
        } else {
            Ok(sample_assets(spec, self.cost))
        }
    }
}
