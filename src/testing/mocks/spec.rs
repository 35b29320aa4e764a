//! Spec source stub

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{FactoryError, FailureKind, Result};
use crate::spec::{ArtifactSpecification, DesignHints, GeneratedSpec, SpecSource, SpecSummary};

#[derive(Debug, Clone)]
enum Outcome {
    Spec(ArtifactSpecification, f64),
    Malformed(String),
    Collaborator(FailureKind, String),
}

/// Hands out one fixed specification, or one fixed failure
#[derive(Debug)]
pub struct FixedSpecSource {
    outcome: Outcome,
    delay: Option<Duration>,
    priors_seen: Mutex<Vec<usize>>,
}

impl FixedSpecSource {
    pub fn new(spec: ArtifactSpecification, cost: f64) -> Self {
        Self::with_outcome(Outcome::Spec(spec, cost))
    }

    /// Every call fails as if the LLM kept answering garbage
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Malformed(message.into()))
    }

    pub fn failing(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Collaborator(kind, message.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of priors passed on each call
    pub fn priors_seen(&self) -> Vec<usize> {
        self.priors_seen.lock().unwrap().clone()
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            delay: None,
            priors_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpecSource for FixedSpecSource {
    async fn generate(
        &self,
        priors: &[SpecSummary],
        _hints: Option<&DesignHints>,
    ) -> Result<GeneratedSpec> {
        self.priors_seen.lock().unwrap().push(priors.len());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            Outcome::Spec(spec, cost) => Ok(GeneratedSpec {
                spec: spec.clone(),
                cost: *cost,
                responses: 1,
            }),
            Outcome::Malformed(message) => Err(FactoryError::parse(message.clone())),
            Outcome::Collaborator(kind, message) => {
                Err(FactoryError::collaborator("llm", *kind, message.clone()))
            }
        }
    }
}
