//! Generation orchestration.
//!
//! One request runs spec generation once, then a bounded loop of
//! content fan-out and validation, then either delivers the accepted
//! payload or falls back to a baseline. Attempts are strictly
//! sequential; the three content generators inside an attempt run
//! concurrently and are all joined before validation starts.
//!
//! The caller always gets a [`GenerationResult`]. Errors scoped to one
//! attempt become zero-score attempt records; only spec failure,
//! validator infrastructure failure, permanent collaborator failure,
//! persistence failure and cancellation end the request early.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::abstractions::ArtifactSink;
use crate::cancel::CancellationToken;
use crate::config::GenerationConfig;
use crate::content::theme::derive_theme;
use crate::content::{
    ArtifactPayload, AssetBundle, ContentGenerator, LogicBundle, PayloadOrigin, ThemeGenerator,
    ThemePayload,
};
use crate::error::{ErrorCode, FactoryError, Result};
use crate::fallback::FallbackSelector;
use crate::quality::{QualityGate, QualityScore};
use crate::spec::{
    novelty_report, ArtifactSpecification, DesignHints, NoveltyReport, SpecSource, SpecSummary,
};

pub mod feedback;
pub mod ledger;
pub mod result;
pub mod state;

pub use feedback::build_feedback;
pub use ledger::CostLedger;
pub use result::{content_digest, GenerationAttempt, GenerationResult, StopReason};
pub use state::{GenerationState, StateMachine, StateTransition};

/// Inputs for one request besides configuration
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Prior specs the new one should differ from
    pub priors: Vec<SpecSummary>,
    pub hints: Option<DesignHints>,
}

impl GenerationRequest {
    pub fn new(priors: Vec<SpecSummary>) -> Self {
        Self {
            priors,
            hints: None,
        }
    }

    pub fn with_hints(mut self, hints: DesignHints) -> Self {
        self.hints = Some(hints);
        self
    }
}

/// Builder for [`GenerationOrchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    spec_source: Option<Arc<dyn SpecSource>>,
    logic: Option<Arc<dyn ContentGenerator<LogicBundle>>>,
    theme: Option<Arc<dyn ContentGenerator<ThemePayload>>>,
    assets: Option<Arc<dyn ContentGenerator<AssetBundle>>>,
    validator: Option<Arc<dyn QualityGate>>,
    fallback: Option<Arc<FallbackSelector>>,
    sink: Option<Arc<dyn ArtifactSink>>,
}

impl OrchestratorBuilder {
    pub fn spec_source(mut self, source: Arc<dyn SpecSource>) -> Self {
        self.spec_source = Some(source);
        self
    }

    pub fn logic(mut self, generator: Arc<dyn ContentGenerator<LogicBundle>>) -> Self {
        self.logic = Some(generator);
        self
    }

    pub fn theme(mut self, generator: Arc<dyn ContentGenerator<ThemePayload>>) -> Self {
        self.theme = Some(generator);
        self
    }

    pub fn assets(mut self, generator: Arc<dyn ContentGenerator<AssetBundle>>) -> Self {
        self.assets = Some(generator);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn QualityGate>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn fallback(mut self, selector: Arc<FallbackSelector>) -> Self {
        self.fallback = Some(selector);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The theme generator and fallback selector default to the built-in
    /// ones; every other collaborator is required.
    pub fn build(self) -> Result<GenerationOrchestrator> {
        let missing = |name: &str| FactoryError::config(format!("orchestrator needs a {}", name));
        Ok(GenerationOrchestrator {
            spec_source: self.spec_source.ok_or_else(|| missing("spec source"))?,
            logic: self.logic.ok_or_else(|| missing("logic generator"))?,
            theme: self.theme.unwrap_or_else(|| {
                Arc::new(ThemeGenerator) as Arc<dyn ContentGenerator<ThemePayload>>
            }),
            assets: self.assets.ok_or_else(|| missing("asset generator"))?,
            validator: self.validator.ok_or_else(|| missing("quality validator"))?,
            fallback: self.fallback.unwrap_or_default(),
            sink: self.sink.ok_or_else(|| missing("artifact sink"))?,
        })
    }
}

pub struct GenerationOrchestrator {
    spec_source: Arc<dyn SpecSource>,
    logic: Arc<dyn ContentGenerator<LogicBundle>>,
    theme: Arc<dyn ContentGenerator<ThemePayload>>,
    assets: Arc<dyn ContentGenerator<AssetBundle>>,
    validator: Arc<dyn QualityGate>,
    fallback: Arc<FallbackSelector>,
    sink: Arc<dyn ArtifactSink>,
}

/// Races every suspension point against cancellation and the deadline
struct Guard {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl Guard {
    async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.cancel.check()?;
        let deadline = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FactoryError::cancelled("cancellation requested")),
            _ = deadline => Err(FactoryError::request_timeout(
                self.deadline.map(|(_, limit)| limit).unwrap_or_default(),
            )),
            result = future => result,
        }
    }
}

/// Mutable bookkeeping for one request, owned by `generate`
struct Run {
    machine: StateMachine,
    ledger: CostLedger,
    attempts: Vec<GenerationAttempt>,
    spec_id: Option<String>,
    novelty: Option<NoveltyReport>,
    stop_reason: Option<StopReason>,
}

impl Run {
    fn advance(&mut self, to: GenerationState) -> Result<()> {
        self.machine.advance(to)
    }
}

struct Delivery {
    location: String,
    digest: String,
    baseline: Option<String>,
}

enum Outcome {
    Delivered(Delivery),
    Rejected { message: String, code: Option<u16> },
}

/// What one attempt produced, before acceptance is decided
struct AttemptOutcome {
    record: GenerationAttempt,
    payload: Option<ArtifactPayload>,
    /// Attempt-local failure that replaced validation
    error: Option<FactoryError>,
    /// Failure that ends the request once this attempt is recorded
    terminal: Option<FactoryError>,
}

impl GenerationOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Run one generation request to completion.
    ///
    /// `config` applies to this call only. Cancelling `cancel` ends the
    /// request at its next suspension point; attempts already recorded are
    /// kept in the result.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> GenerationResult {
        let request_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let guard = Guard {
            cancel,
            deadline: config.timeouts.request.map(|limit| (clock + limit, limit)),
        };
        let mut run = Run {
            machine: StateMachine::new(),
            ledger: CostLedger::new(config.cost_budget),
            attempts: Vec::new(),
            spec_id: None,
            novelty: None,
            stop_reason: None,
        };

        let span = info_span!("generation", %request_id, spec_id = tracing::field::Empty);
        let outcome = self
            .drive(&mut run, &request, config, &guard)
            .instrument(span.clone())
            .await;

        let (success, fallback_used, output_location, content_digest, baseline, error, error_code) =
            match outcome {
                Ok(Outcome::Delivered(delivery)) => {
                    let fallback_used = delivery.baseline.is_some();
                    (
                        true,
                        fallback_used,
                        Some(delivery.location),
                        Some(delivery.digest),
                        delivery.baseline,
                        None,
                        None,
                    )
                }
                Ok(Outcome::Rejected { message, code }) => {
                    run.machine.fail();
                    (false, false, None, None, None, Some(message), code)
                }
                Err(e) => {
                    run.machine.fail();
                    if run.stop_reason.is_none() {
                        run.stop_reason = Some(stop_reason_for(&e));
                    }
                    warn!(%request_id, error = %e, "Generation request failed");
                    (false, false, None, None, None, Some(e.user_message()), Some(e.code()))
                }
            };

        let result = GenerationResult {
            request_id,
            spec_id: run.spec_id,
            success,
            fallback_used,
            baseline,
            stop_reason: run.stop_reason.unwrap_or(StopReason::AttemptsExhausted),
            attempts: run.attempts,
            spec_cost: run.ledger.spec_cost,
            total_cost: run.ledger.spent(),
            budget: run.ledger.budget,
            duration: clock.elapsed(),
            started_at,
            finished_at: Utc::now(),
            output_location,
            content_digest,
            error,
            error_code,
            novelty: run.novelty,
            state_trace: run.machine.into_trace(),
        };

        if let Some(location) = &result.output_location {
            match result.to_json() {
                Ok(json) => {
                    if let Err(e) = self.sink.write_provenance(location, &json).await {
                        warn!(%location, error = %e, "Could not write provenance");
                    }
                }
                Err(e) => warn!(error = %e, "Could not serialize provenance"),
            }
        }

        info!(
            %request_id,
            success = result.success,
            fallback = result.fallback_used,
            attempts = result.attempts.len(),
            total_cost = result.total_cost,
            "Generation request finished"
        );
        result
    }

    async fn drive(
        &self,
        run: &mut Run,
        request: &GenerationRequest,
        config: &GenerationConfig,
        guard: &Guard,
    ) -> Result<Outcome> {
        let invalid = config.validation_errors();
        if !invalid.is_empty() {
            run.stop_reason = Some(StopReason::InvalidConfig);
            return Err(FactoryError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                invalid.join("; "),
            ));
        }

        let spec = Arc::new(self.obtain_spec(run, request, config, guard).await?);
        tracing::Span::current().record("spec_id", spec.id.as_str());
        run.advance(GenerationState::SpecReady)?;

        let thresholds = config.quality_thresholds();
        let max_attempts = config.max_retries;
        let mut theme_cache: Option<ThemePayload> = None;
        let mut last_assets: Option<AssetBundle> = None;
        let mut feedback: Option<String> = None;
        let mut accepted: Option<ArtifactPayload> = None;

        for attempt in 1..=max_attempts {
            if let Err(e) = run.ledger.check_projection(config.estimated_attempt_cost) {
                warn!(attempt, error = %e, "Budget does not cover another attempt");
                run.stop_reason = Some(StopReason::BudgetExhausted);
                break;
            }

            run.advance(GenerationState::ContentPending { attempt })?;
            let started = Instant::now();
            let outcome = self
                .run_attempt(
                    run,
                    &spec,
                    attempt,
                    feedback.as_deref(),
                    &mut theme_cache,
                    &mut last_assets,
                    config,
                    guard,
                )
                .await?;
            let AttemptOutcome {
                mut record,
                payload,
                error,
                terminal,
            } = outcome;
            record.duration = started.elapsed();
            run.ledger.record_attempt(record.cost);

            if let Some(e) = terminal {
                warn!(attempt, cost = record.cost, error = %e, "Attempt ended the request");
                run.attempts.push(record);
                return Err(e);
            }

            let can_continue = attempt < max_attempts
                && !run.ledger.is_exhausted()
                && run
                    .ledger
                    .check_projection(config.estimated_attempt_cost)
                    .is_ok();

            if error.is_none() && !record.success && !can_continue {
                // Final permitted attempt: relaxed bar, but it must build
                if record.score.meets_last_chance(&config.last_chance) {
                    info!(
                        attempt,
                        overall = record.score.overall,
                        "Accepting final attempt under last-chance policy"
                    );
                    record.success = true;
                    record.last_chance = true;
                }
            }

            info!(
                attempt,
                overall = record.score.overall,
                passed = record.success,
                cost = record.cost,
                "Attempt finished"
            );

            let success = record.success;
            let next_feedback = if success {
                None
            } else {
                build_feedback(&record.score, &thresholds, error.as_ref())
            };
            run.attempts.push(record);

            if success {
                run.advance(GenerationState::Accepted { attempt })?;
                run.stop_reason = Some(StopReason::Accepted);
                accepted = payload;
                break;
            }

            run.advance(GenerationState::RetryPending { attempt })?;
            feedback = next_feedback;

            if !can_continue {
                if attempt < max_attempts {
                    warn!(
                        attempt,
                        spent = run.ledger.attempts_spent(),
                        budget = run.ledger.budget,
                        "Stopping early, budget exhausted"
                    );
                    run.stop_reason = Some(StopReason::BudgetExhausted);
                }
                break;
            }

            let delay = config.backoff.delay_for(attempt);
            debug!(attempt, ?delay, "Backing off before next attempt");
            guard
                .run(async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
        }

        if let Some(payload) = accepted {
            let delivery = self.deliver(&spec, &payload, guard).await.inspect_err(|_| {
                run.stop_reason = Some(StopReason::Persistence);
            })?;
            run.advance(GenerationState::Done { success: true })?;
            return Ok(Outcome::Delivered(delivery));
        }

        if run.stop_reason.is_none() {
            run.stop_reason = Some(StopReason::AttemptsExhausted);
        }

        if config.enable_fallback {
            run.advance(GenerationState::FallbackPending)?;
            let theme = theme_cache.unwrap_or_else(|| derive_theme(&spec.visual));
            let payload = self.fallback.select(&spec, &theme, last_assets);
            let mut delivery = self.deliver(&spec, &payload, guard).await.inspect_err(|_| {
                run.stop_reason = Some(StopReason::Persistence);
            })?;
            if let PayloadOrigin::Fallback { baseline } = &payload.origin {
                delivery.baseline = Some(baseline.clone());
            }
            run.advance(GenerationState::Done { success: true })?;
            return Ok(Outcome::Delivered(delivery));
        }

        Ok(self.rejection(run))
    }

    async fn obtain_spec(
        &self,
        run: &mut Run,
        request: &GenerationRequest,
        config: &GenerationConfig,
        guard: &Guard,
    ) -> Result<ArtifactSpecification> {
        let generated = guard
            .run(self.spec_source.generate(&request.priors, request.hints.as_ref()))
            .await;

        let spec = match generated {
            Ok(generated) => {
                run.ledger.record_spec(generated.cost);
                generated.spec
            }
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) if config.proceed_with_default_spec => {
                warn!(error = %e, "Spec generation failed, continuing with default spec");
                ArtifactSpecification::default_spec(config.stage_count)
            }
            Err(e) => {
                run.stop_reason = Some(StopReason::SpecFailed);
                return Err(e);
            }
        };

        let novelty = novelty_report(&spec.summary(), &request.priors, config.novelty_warn_threshold);
        if novelty.is_similar {
            warn!(
                spec_id = %spec.id,
                similarity = novelty.max_similarity,
                most_similar = ?novelty.most_similar,
                "Specification closely resembles a prior one"
            );
        }
        run.spec_id = Some(spec.id.clone());
        run.novelty = Some(novelty);
        info!(spec_id = %spec.id, stages = spec.stages.len(), "Specification ready");
        Ok(spec)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_attempt(
        &self,
        run: &mut Run,
        spec: &ArtifactSpecification,
        attempt: u32,
        feedback: Option<&str>,
        theme_cache: &mut Option<ThemePayload>,
        last_assets: &mut Option<AssetBundle>,
        config: &GenerationConfig,
        guard: &Guard,
    ) -> Result<AttemptOutcome> {
        let thresholds = config.quality_thresholds();
        let cached_theme = theme_cache.clone();
        let theme_future = async {
            match cached_theme {
                Some(theme) => Ok(theme),
                None => self.theme.generate(spec, feedback).await,
            }
        };

        let (logic, theme, assets) = guard
            .run(async {
                Ok(tokio::join!(
                    self.logic.generate(spec, feedback),
                    theme_future,
                    self.assets.generate(spec, feedback),
                ))
            })
            .await?;

        let mut record = GenerationAttempt {
            number: attempt,
            score: QualityScore::zero("not validated", &thresholds),
            cost: 0.0,
            duration: Duration::ZERO,
            success: false,
            last_chance: false,
            error: None,
            feedback: feedback.map(str::to_string),
            placeholder_assets: 0,
        };

        if let Ok(theme) = &theme {
            *theme_cache = Some(theme.clone());
        }
        if let Ok(bundle) = &assets {
            record.cost += bundle.cost;
            record.placeholder_assets = bundle.placeholder_count();
            *last_assets = Some(bundle.clone());
        }
        match &logic {
            Ok(bundle) => record.cost += bundle.cost,
            Err(e) => record.cost += e.incurred_cost(),
        }

        let payload = match (logic, theme, assets) {
            (Ok(logic), Ok(theme), Ok(assets)) => ArtifactPayload {
                logic,
                theme,
                assets,
                origin: PayloadOrigin::Generated { attempt },
            },
            (logic, theme, assets) => {
                let (terminal, local): (Vec<FactoryError>, Vec<FactoryError>) =
                    [logic.err(), theme.err(), assets.err()]
                        .into_iter()
                        .flatten()
                        .partition(FactoryError::is_terminal);
                if let Some(e) = terminal.into_iter().next() {
                    record.score = QualityScore::zero(e.user_message(), &thresholds);
                    record.error = Some(e.user_message());
                    return Ok(AttemptOutcome {
                        record,
                        payload: None,
                        error: None,
                        terminal: Some(e),
                    });
                }
                let reasons: Vec<String> = local.iter().map(|e| e.user_message()).collect();
                warn!(attempt, errors = ?reasons, "Content generation failed for this attempt");
                record.score = QualityScore::zero(reasons.join("; "), &thresholds);
                record.error = Some(reasons.join("; "));
                return Ok(AttemptOutcome {
                    record,
                    payload: None,
                    error: local.into_iter().next(),
                    terminal: None,
                });
            }
        };

        run.advance(GenerationState::Validating { attempt })?;
        let validated = guard
            .run(self.validator.validate(spec, &payload, &thresholds))
            .await;

        match validated {
            Ok(score) => {
                debug!(attempt, findings = score.findings.len(), "Validator returned");
                record.success = score.passed;
                record.score = score;
                Ok(AttemptOutcome {
                    record,
                    payload: Some(payload),
                    error: None,
                    terminal: None,
                })
            }
            Err(e) if e.is_attempt_local() => {
                warn!(attempt, error = %e, "Validation failed for this attempt");
                record.score = QualityScore::zero(e.user_message(), &thresholds);
                record.error = Some(e.user_message());
                Ok(AttemptOutcome {
                    record,
                    payload: None,
                    error: Some(e),
                    terminal: None,
                })
            }
            Err(e) => {
                if !e.is_cancellation() {
                    run.stop_reason = Some(StopReason::Infrastructure);
                }
                record.score = QualityScore::zero(e.user_message(), &thresholds);
                record.error = Some(e.user_message());
                Ok(AttemptOutcome {
                    record,
                    payload: None,
                    error: None,
                    terminal: Some(e),
                })
            }
        }
    }

    async fn deliver(
        &self,
        spec: &ArtifactSpecification,
        payload: &ArtifactPayload,
        guard: &Guard,
    ) -> Result<Delivery> {
        let files = payload.output_files(spec)?;
        let digest = content_digest(&payload.logic.files);
        let location = guard
            .run(self.sink.write_artifact(&spec.id, &files, &payload.assets.assets))
            .await?;
        info!(spec_id = %spec.id, %location, "Artifact written");
        Ok(Delivery {
            location,
            digest,
            baseline: None,
        })
    }

    fn rejection(&self, run: &Run) -> Outcome {
        if run.stop_reason == Some(StopReason::BudgetExhausted) {
            let err =
                FactoryError::budget_exceeded(run.ledger.attempts_spent(), run.ledger.budget);
            return Outcome::Rejected {
                message: err.user_message(),
                code: Some(err.code()),
            };
        }

        let last = run.attempts.last().map(|a| {
            a.error.clone().unwrap_or_else(|| {
                format!("best overall score {:.1}", a.score.overall)
            })
        });
        Outcome::Rejected {
            message: format!(
                "No attempt passed quality validation after {} attempt(s){}",
                run.attempts.len(),
                last.map(|l| format!(": {}", l)).unwrap_or_default()
            ),
            code: None,
        }
    }
}

fn stop_reason_for(error: &FactoryError) -> StopReason {
    match error {
        FactoryError::Cancelled { code, .. } if *code == ErrorCode::REQUEST_TIMEOUT => {
            StopReason::TimedOut
        }
        FactoryError::Cancelled { .. } => StopReason::Cancelled,
        FactoryError::Persistence { .. } => StopReason::Persistence,
        FactoryError::Collaborator { .. } => StopReason::CollaboratorFailed,
        FactoryError::Config { .. } => StopReason::InvalidConfig,
        _ => StopReason::Infrastructure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::testing::{
        FixedSpecSource, MemorySink, ScriptedGate, StubLogic, TestContext,
    };

    async fn run(ctx: &TestContext) -> GenerationResult {
        ctx.orchestrator()
            .generate(GenerationRequest::default(), &ctx.config, CancellationToken::new())
            .await
    }

    #[test]
    fn test_builder_requires_every_collaborator() {
        let err = GenerationOrchestrator::builder().build().err().unwrap();
        assert!(err.to_string().contains("spec source"));

        let ctx = TestContext::new();
        let without_sink = GenerationOrchestrator::builder()
            .spec_source(ctx.spec_source.clone())
            .logic(ctx.logic.clone())
            .assets(ctx.assets.clone())
            .validator(ctx.gate.clone());
        assert!(without_sink.build().is_err());
    }

    #[tokio::test]
    async fn test_trace_of_first_try_acceptance() {
        let ctx = TestContext::new();
        let result = run(&ctx).await;

        assert!(result.success);
        assert_eq!(result.stop_reason, StopReason::Accepted);
        let states: Vec<String> = result.state_trace.iter().map(|t| t.to.to_string()).collect();
        assert_eq!(
            states,
            vec![
                "SpecReady",
                "ContentPending(1)",
                "Validating(1)",
                "Accepted(1)",
                "Done(success)"
            ]
        );
        assert_eq!(result.output_location.as_deref(), Some("memory://sky-hopper"));
        assert!(result.content_digest.is_some());
        assert_eq!(ctx.sink.provenance().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_structural_error_becomes_zero_score_and_feedback() {
        let ctx = TestContext::new().with_logic(
            StubLogic::new(0.1).then_structural(vec!["no update function".into()], 0.3),
        );
        let result = run(&ctx).await;

        assert!(result.success);
        assert_eq!(result.attempts.len(), 2);
        let first = &result.attempts[0];
        assert_eq!(first.score.overall, 0.0);
        assert!(!first.success);
        assert!((first.cost - 0.3).abs() < 1e-9);
        assert!(first.error.as_deref().unwrap().contains("no update function"));

        let feedback = ctx.logic.feedback();
        assert_eq!(feedback[0], None);
        assert_eq!(
            feedback[1].as_deref(),
            Some("- structural check: no update function")
        );
        assert_eq!(ctx.gate.calls(), 1);
        assert!(result
            .state_trace
            .iter()
            .any(|t| t.to == GenerationState::RetryPending { attempt: 1 }
                && t.from == GenerationState::ContentPending { attempt: 1 }));
    }

    #[tokio::test]
    async fn test_permanent_collaborator_failure_ends_request() {
        let ctx = TestContext::new().with_logic(
            StubLogic::new(0.0).then_collaborator_error(FailureKind::Permanent, "quota exhausted"),
        );
        let result = run(&ctx).await;

        assert!(!result.success);
        assert!(!result.fallback_used);
        assert_eq!(result.stop_reason, StopReason::CollaboratorFailed);
        assert_eq!(result.error_code, Some(ErrorCode::COLLABORATOR_PERMANENT));
        assert!(ctx.sink.artifacts().is_empty());
        assert_eq!(
            result.state_trace.last().map(|t| t.to),
            Some(GenerationState::Done { success: false })
        );
        // the failed attempt is still on record
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].error.as_deref().unwrap().contains("quota exhausted"));
        assert_eq!(ctx.gate.calls(), 0);
    }

    #[tokio::test]
    async fn test_validator_infrastructure_is_terminal_even_with_fallback() {
        let ctx = TestContext::new()
            .with_logic(StubLogic::new(0.7))
            .with_gate(ScriptedGate::new().unavailable("no compiler"));
        let result = run(&ctx).await;

        assert!(!result.success);
        assert!(!result.fallback_used);
        assert_eq!(result.stop_reason, StopReason::Infrastructure);
        assert_eq!(result.attempts.len(), 1);
        assert!(!result.attempts[0].success);
        assert!(result.attempts[0].error.as_deref().unwrap().contains("no compiler"));
        assert!((result.total_cost - 0.7).abs() < 1e-9);
        assert!(result.error.unwrap().contains("no compiler"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_infrastructure_failure_keeps_every_paid_attempt() {
        let ctx = TestContext::new()
            .with_logic(StubLogic::new(1.0))
            .with_gate(ScriptedGate::new().score(40.0).unavailable("no compiler"));
        let result = run(&ctx).await;

        assert_eq!(ctx.gate.calls(), 2);
        assert_eq!(result.attempts.len(), 2);
        assert!((result.total_cost - 2.0).abs() < 1e-9);
        let costs: f64 = result.attempts.iter().map(|a| a.cost).sum();
        assert!((result.total_cost - result.spec_cost - costs).abs() < 1e-9);
        assert_eq!(
            result.state_trace.last().map(|t| (t.from, t.to)),
            Some((
                GenerationState::Validating { attempt: 2 },
                GenerationState::Done { success: false }
            ))
        );
    }

    #[tokio::test]
    async fn test_zero_max_retries_is_rejected_before_any_work() {
        let ctx = TestContext::new().configure(|c| {
            c.max_retries = 0;
            c.enable_fallback = false;
        });
        let result = run(&ctx).await;

        assert!(!result.success);
        assert!(result.attempts.is_empty());
        assert_eq!(result.stop_reason, StopReason::InvalidConfig);
        assert_eq!(result.error_code, Some(ErrorCode::CONFIG_INVALID_VALUE));
        assert!(result.error.unwrap().contains("max_retries"));
        assert!(ctx.spec_source.priors_seen().is_empty());
        assert_eq!(ctx.gate.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validator_timeout_consumes_one_attempt() {
        let ctx = TestContext::new().with_gate(ScriptedGate::new().timeout().score(100.0));
        let result = run(&ctx).await;

        assert!(result.success);
        assert_eq!(result.attempts.len(), 2);
        assert!(result.attempts[0].error.is_some());
    }

    #[tokio::test]
    async fn test_spec_failure_is_terminal_by_default() {
        let ctx = TestContext::new().with_spec_source(FixedSpecSource::malformed("not json"));
        let result = run(&ctx).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, StopReason::SpecFailed);
        assert!(result.spec_id.is_none());
        assert!(result.attempts.is_empty());
        assert_eq!(result.state_trace.len(), 1);
    }

    #[tokio::test]
    async fn test_spec_failure_can_proceed_with_default_spec() {
        let ctx = TestContext::new()
            .with_spec_source(FixedSpecSource::malformed("not json"))
            .configure(|c| c.proceed_with_default_spec = true);
        let result = run(&ctx).await;

        assert!(result.success);
        assert_eq!(result.spec_id.as_deref(), Some("sky-hopper"));
    }

    #[tokio::test]
    async fn test_sink_failure_is_terminal() {
        let ctx = TestContext::new().with_sink(MemorySink::failing());
        let result = run(&ctx).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, StopReason::Persistence);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_completed_attempts() {
        let ctx = TestContext::new()
            .with_gate(ScriptedGate::always(20.0))
            .configure(|c| c.backoff.initial_delay = Duration::from_secs(30))
            .configure(|c| c.backoff.max_delay = Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let result = ctx
            .orchestrator()
            .generate(GenerationRequest::default(), &ctx.config, cancel)
            .await;

        assert!(!result.success);
        assert!(!result.fallback_used);
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.error_code, Some(ErrorCode::CANCELLED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_deadline_times_out() {
        let ctx = TestContext::new()
            .with_logic(StubLogic::new(0.0).with_delay(Duration::from_secs(600)))
            .configure(|c| c.timeouts.request = Some(Duration::from_secs(60)));
        let result = run(&ctx).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, StopReason::TimedOut);
        assert_eq!(result.error_code, Some(ErrorCode::REQUEST_TIMEOUT));
    }

    #[tokio::test]
    async fn test_novelty_is_reported_not_enforced() {
        let ctx = TestContext::new();
        let prior = {
            let mut spec = crate::testing::sample_spec();
            spec.id = "sky-hopper-original".into();
            spec.summary()
        };
        let result = ctx
            .orchestrator()
            .generate(GenerationRequest::new(vec![prior]), &ctx.config, CancellationToken::new())
            .await;

        assert!(result.success);
        let novelty = result.novelty.unwrap();
        assert!(novelty.is_similar);
        assert_eq!(novelty.most_similar.as_deref(), Some("sky-hopper-original"));
        assert_eq!(ctx.spec_source.priors_seen(), vec![1]);
    }
}
