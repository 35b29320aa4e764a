//! Text-completion collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Raw completion text plus what the call cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    /// Cost estimate in currency units
    #[serde(default)]
    pub cost: f64,
}

impl Completion {
    pub fn new(text: impl Into<String>, cost: f64) -> Self {
        Self {
            text: text.into(),
            cost,
        }
    }
}

/// Trait for LLM completion calls
///
/// Implementations report failures as [`FactoryError::Collaborator`]
/// with a [`FailureKind`]: transient for network errors, rate limits and
/// timeouts; permanent for authentication or quota problems. Callers retry
/// only the transient kind.
///
/// [`FactoryError::Collaborator`]: crate::error::FactoryError::Collaborator
/// [`FailureKind`]: crate::error::FailureKind
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion>;
}
