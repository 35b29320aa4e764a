//! End-to-end attempt loop behavior against stub collaborators

use std::time::Duration;

use gamefactory::cancel::CancellationToken;
use gamefactory::orchestrator::{GenerationRequest, GenerationResult, GenerationState, StopReason};
use gamefactory::quality::weighted_overall;
use gamefactory::testing::{
    sample_spec, FixedSpecSource, ScriptedGate, StubAssets, StubLogic, TestContext,
};

async fn generate(ctx: &TestContext) -> GenerationResult {
    ctx.orchestrator()
        .generate(GenerationRequest::default(), &ctx.config, CancellationToken::new())
        .await
}

fn assert_score_invariant(result: &GenerationResult) {
    for attempt in &result.attempts {
        let s = &attempt.score;
        assert!((0.0..=100.0).contains(&s.overall));
        let expected = weighted_overall(s.structural, s.behavioral, s.visual);
        assert!(
            (s.overall - expected).abs() < 1e-9,
            "attempt {} overall {} != weighted {}",
            attempt.number,
            s.overall,
            expected
        );
    }
}

#[tokio::test]
async fn single_attempt_without_fallback_fails() {
    let ctx = TestContext::new()
        .with_gate(ScriptedGate::always(40.0))
        .configure(|c| {
            c.max_retries = 1;
            c.enable_fallback = false;
        });
    let result = generate(&ctx).await;

    assert!(!result.success);
    assert!(!result.fallback_used);
    assert_eq!(result.attempts.len(), 1);
    assert!(result.error.as_deref().unwrap().contains("after 1 attempt"));
    assert!(result.output_location.is_none());
    assert!(ctx.sink.artifacts().is_empty());
    assert_score_invariant(&result);
}

#[tokio::test]
async fn perfect_first_attempt_is_accepted() {
    let ctx = TestContext::new().with_gate(ScriptedGate::always(100.0));
    let result = generate(&ctx).await;

    assert!(result.success);
    assert_eq!(result.attempts.len(), 1);
    assert!(!result.fallback_used);
    assert_eq!(result.accepted_score().map(|s| s.overall), Some(100.0));
    assert_score_invariant(&result);
}

#[tokio::test(start_paused = true)]
async fn second_attempt_accepted_after_feedback() {
    let ctx = TestContext::new()
        .with_gate(ScriptedGate::new().score(55.0).score(82.0))
        .configure(|c| {
            c.dimension_thresholds.structural = 80.0;
            c.dimension_thresholds.behavioral = 80.0;
            c.dimension_thresholds.visual = 80.0;
        });
    let result = generate(&ctx).await;

    assert!(result.success);
    assert!(!result.fallback_used);
    assert_eq!(result.attempts.len(), 2);
    assert!(!result.attempts[0].success);
    assert!(result.attempts[1].success);
    assert!(!result.attempts[1].last_chance);
    assert_eq!(result.spec_id.as_deref(), Some("sky-hopper"));

    // attempt 2 was steered by attempt 1's gate failures
    let feedback = ctx.logic.feedback();
    assert_eq!(feedback.len(), 2);
    assert!(feedback[1]
        .as_deref()
        .unwrap()
        .contains("structural score 55.0 below 80.0"));
    assert_eq!(result.attempts[1].feedback, feedback[1]);
    assert_score_invariant(&result);
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_fall_back() {
    let ctx = TestContext::new().with_gate(ScriptedGate::always(40.0));
    let result = generate(&ctx).await;

    assert!(result.success);
    assert!(result.fallback_used);
    assert_eq!(result.attempts.len(), 5);
    assert!(result.attempts.iter().all(|a| !a.success));
    assert_eq!(result.stop_reason, StopReason::AttemptsExhausted);
    assert!(result.baseline.is_some());
    assert!(result.accepted_score().is_none());

    let stored = ctx.sink.artifacts();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].asset_names.len(), 3);
    assert!(stored[0].files.iter().any(|f| f.path == "spec.json"));
    assert_score_invariant(&result);
}

#[tokio::test(start_paused = true)]
async fn budget_projection_caps_attempts() {
    let ctx = TestContext::new()
        .with_logic(StubLogic::new(2.10))
        .with_assets(StubAssets::new(0.0))
        .with_gate(ScriptedGate::always(40.0))
        .configure(|c| {
            c.max_retries = 10;
            c.cost_budget = 5.0;
            c.estimated_attempt_cost = 2.10;
        });
    let result = generate(&ctx).await;

    assert_eq!(result.attempts.len(), 2);
    assert!((result.total_cost - 4.20).abs() < 1e-9);
    assert!(result.total_cost <= result.budget);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);
    assert!(result.fallback_used);
}

#[tokio::test(start_paused = true)]
async fn budget_projection_from_observed_attempt_cost() {
    // no configured estimate: attempt 3 is projected from attempt 2's cost
    let ctx = TestContext::new()
        .with_logic(StubLogic::new(2.10))
        .with_gate(ScriptedGate::always(40.0))
        .configure(|c| {
            c.max_retries = 10;
            c.cost_budget = 5.0;
            c.estimated_attempt_cost = 0.0;
        });
    let result = generate(&ctx).await;

    assert_eq!(result.attempts.len(), 2);
    assert!((result.total_cost - 4.20).abs() < 1e-9);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);
    assert!(result.fallback_used);
}

#[tokio::test(start_paused = true)]
async fn spec_cost_is_billed_but_not_budgeted() {
    let ctx = TestContext::new()
        .with_spec_source(FixedSpecSource::new(sample_spec(), 1.50))
        .with_logic(StubLogic::new(2.10))
        .with_gate(ScriptedGate::always(40.0))
        .configure(|c| {
            c.max_retries = 10;
            c.cost_budget = 5.0;
            c.estimated_attempt_cost = 2.10;
        });
    let result = generate(&ctx).await;

    assert_eq!(result.attempts.len(), 2);
    assert!((result.spec_cost - 1.50).abs() < 1e-9);
    assert!((result.total_cost - 5.70).abs() < 1e-9);
    let attempt_spend: f64 = result.attempts.iter().map(|a| a.cost).sum();
    assert!(attempt_spend <= result.budget);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);
}

#[tokio::test(start_paused = true)]
async fn budget_stop_without_fallback_reports_budget() {
    let ctx = TestContext::new()
        .with_logic(StubLogic::new(3.0))
        .with_gate(ScriptedGate::always(40.0))
        .configure(|c| {
            c.cost_budget = 5.0;
            c.enable_fallback = false;
        });
    let result = generate(&ctx).await;

    // no estimate configured: attempt 2 is projected from attempt 1's cost
    assert_eq!(result.attempts.len(), 1);
    assert!(!result.success);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);
    assert!(result.error.unwrap().contains("budget"));
}

#[tokio::test(start_paused = true)]
async fn final_attempt_accepted_under_last_chance() {
    let ctx = TestContext::new()
        .with_gate(ScriptedGate::new().score(30.0).score(65.0))
        .configure(|c| c.max_retries = 2);
    let result = generate(&ctx).await;

    assert!(result.success);
    assert!(!result.fallback_used);
    let last = result.attempts.last().unwrap();
    assert!(last.success);
    assert!(last.last_chance);
    assert!(!last.score.passed);
}

#[tokio::test(start_paused = true)]
async fn last_chance_never_accepts_broken_build() {
    // overall 68 clears the relaxed bar, structural 20 does not
    let ctx = TestContext::new()
        .with_gate(ScriptedGate::new().dimensions(20.0, 100.0, 100.0))
        .configure(|c| {
            c.max_retries = 1;
            c.enable_fallback = false;
        });
    let result = generate(&ctx).await;

    assert!(!result.success);
    assert!(!result.attempts[0].last_chance);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_between_attempts() {
    let ctx = TestContext::new()
        .with_gate(ScriptedGate::always(40.0))
        .configure(|c| {
            c.max_retries = 4;
            c.backoff.initial_delay = Duration::from_secs(1);
            c.backoff.max_delay = Duration::from_secs(8);
        });
    let started = tokio::time::Instant::now();
    let result = generate(&ctx).await;

    // 1s + 2s + 4s between four attempts, none after the last
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(8), "elapsed {:?}", elapsed);
    assert_eq!(result.attempts.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn fallback_keeps_state_trace_legal() {
    let ctx = TestContext::new()
        .with_gate(ScriptedGate::always(10.0))
        .configure(|c| c.max_retries = 2);
    let result = generate(&ctx).await;

    let states: Vec<GenerationState> = result.state_trace.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            GenerationState::SpecReady,
            GenerationState::ContentPending { attempt: 1 },
            GenerationState::Validating { attempt: 1 },
            GenerationState::RetryPending { attempt: 1 },
            GenerationState::ContentPending { attempt: 2 },
            GenerationState::Validating { attempt: 2 },
            GenerationState::RetryPending { attempt: 2 },
            GenerationState::FallbackPending,
            GenerationState::Done { success: true },
        ]
    );
    for pair in result.state_trace.windows(2) {
        assert_eq!(pair[0].to, pair[1].from);
    }
}

#[tokio::test(start_paused = true)]
async fn placeholder_assets_are_recorded() {
    let ctx = TestContext::new().with_assets(StubAssets::placeholders());
    let result = generate(&ctx).await;

    assert!(result.success);
    assert_eq!(result.attempts[0].placeholder_assets, 3);
}

#[tokio::test]
async fn result_serializes_for_provenance() {
    let ctx = TestContext::new();
    let result = generate(&ctx).await;

    let (location, json) = ctx.sink.provenance().pop().unwrap();
    assert_eq!(Some(location), result.output_location);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["stop_reason"], "accepted");
    assert!(value["duration_ms"].is_u64());
    assert_eq!(value["attempts"].as_array().unwrap().len(), 1);

    let back: GenerationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.request_id, result.request_id);
}
