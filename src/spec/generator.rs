//! Spec generation with local retry on malformed output.
//!
//! Malformed responses (syntax errors, schema or invariant violations,
//! duplicate ids) are retried here with the error fed back into the
//! prompt. This is separate from the orchestrator's attempt loop, which
//! only deals with valid-but-poor content.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::model::{ArtifactSpecification, DesignHints, SpecSummary};
use super::parse::parse_spec;
use super::prompt::{render_spec_prompt, spec_prompt_engine};
use crate::abstractions::{Completion, LlmClient};
use crate::cancel::CancellationToken;
use crate::config::GenerationConfig;
use crate::error::{ErrorCode, FactoryError, Result};
use crate::prompt::PromptEngine;
use crate::retry::{RetryConfig, RetryExecutor};

/// A validated spec and what it cost to obtain
#[derive(Debug, Clone)]
pub struct GeneratedSpec {
    pub spec: ArtifactSpecification,
    /// Total collaborator cost across local retries
    pub cost: f64,
    /// Number of collaborator responses consumed
    pub responses: u32,
}

/// Anything that can produce a specification for the orchestrator
#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn generate(
        &self,
        priors: &[SpecSummary],
        hints: Option<&DesignHints>,
    ) -> Result<GeneratedSpec>;
}

pub struct SpecGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: PromptEngine,
    retry: RetryConfig,
    timeout: Duration,
    parse_retries: u32,
    stage_count: usize,
    cancel: CancellationToken,
}

impl SpecGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            llm,
            prompts: spec_prompt_engine()?,
            retry: config.collaborator_retry.clone(),
            timeout: config.timeouts.spec_call,
            parse_retries: config.spec_parse_retries.max(1),
            stage_count: config.stage_count,
            cancel,
        })
    }

    async fn call(&self, prompt: &str) -> Result<Completion> {
        match tokio::time::timeout(self.timeout, self.llm.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(FactoryError::collaborator_timeout("llm", self.timeout)),
        }
    }

    fn check_unique(spec: &ArtifactSpecification, taken: &HashSet<&str>) -> Result<()> {
        if taken.contains(spec.id.as_str()) {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_DUPLICATE_ID,
                format!("id '{}' is already used by an existing spec", spec.id),
                Some("id"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SpecSource for SpecGenerator {
    async fn generate(
        &self,
        priors: &[SpecSummary],
        hints: Option<&DesignHints>,
    ) -> Result<GeneratedSpec> {
        let taken: HashSet<&str> = priors.iter().map(|p| p.id.as_str()).collect();
        let executor = RetryExecutor::new(self.retry.clone(), self.cancel.clone());
        let mut cost = 0.0;
        let mut correction: Option<String> = None;
        let mut last_error = None;

        for response in 1..=self.parse_retries {
            let prompt = render_spec_prompt(
                &self.prompts,
                priors,
                hints,
                correction.as_deref(),
                self.stage_count,
            )?;
            debug!(response, prompt_len = prompt.len(), "Requesting specification");

            let this = self;
            let prompt_ref = prompt.as_str();
            let completion = executor
                .execute_with_retry(move || this.call(prompt_ref), "spec generation")
                .await?;
            cost += completion.cost;

            let parsed = parse_spec(&completion.text, self.stage_count)
                .and_then(|spec| Self::check_unique(&spec, &taken).map(|_| spec));

            match parsed {
                Ok(spec) => {
                    info!(spec_id = %spec.id, responses = response, "Specification ready");
                    let regressions = spec.difficulty_regressions();
                    if !regressions.is_empty() {
                        warn!(spec_id = %spec.id, stages = ?regressions, "Stage difficulty decreases");
                    }
                    return Ok(GeneratedSpec {
                        spec,
                        cost,
                        responses: response,
                    });
                }
                Err(e) if e.is_malformed_spec() => {
                    warn!(
                        response,
                        limit = self.parse_retries,
                        error = %e,
                        "Specification response rejected"
                    );
                    correction = Some(e.to_string());
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FactoryError::parse("no specification response")))
    }
}
