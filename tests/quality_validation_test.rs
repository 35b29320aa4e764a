//! The real validator wired to stub tooling and sandbox

use std::sync::Arc;
use std::time::Duration;

use gamefactory::abstractions::{SimulationReport, TestReport, ToolReport};
use gamefactory::content::theme::derive_theme;
use gamefactory::content::{ArtifactPayload, PayloadOrigin, StaticCheckRules, StaticChecker};
use gamefactory::error::FactoryError;
use gamefactory::quality::{
    weighted_overall, BehavioralChecker, QualityGate, QualityThresholds, QualityValidator,
    StructuralChecker, VisualChecker,
};
use gamefactory::spec::ArtifactSpecification;
use gamefactory::testing::{
    sample_assets, sample_logic_bundle, sample_spec, StubSandbox, StubTooling,
};

fn healthy_run() -> SimulationReport {
    SimulationReport {
        crashed: false,
        crash_tick: None,
        reached_success: true,
        reached_failure: true,
        ticks_per_second: 600.0,
    }
}

fn validator(tooling: StubTooling, sandbox: StubSandbox) -> QualityValidator {
    QualityValidator::new(
        StructuralChecker::new(
            Arc::new(tooling),
            StaticChecker::new(StaticCheckRules::default()).unwrap(),
        ),
        BehavioralChecker::new(Arc::new(sandbox)),
        VisualChecker::new(),
        Duration::from_secs(30),
    )
}

fn payload_for(spec: &ArtifactSpecification) -> ArtifactPayload {
    ArtifactPayload {
        logic: sample_logic_bundle(0.2),
        theme: derive_theme(&spec.visual),
        assets: sample_assets(spec, 0.3),
        origin: PayloadOrigin::Generated { attempt: 1 },
    }
}

#[tokio::test]
async fn healthy_artifact_passes_every_gate() {
    let spec = sample_spec();
    let score = validator(StubTooling::passing(), StubSandbox::new(healthy_run()))
        .validate(&spec, &payload_for(&spec), &QualityThresholds::default())
        .await
        .unwrap();

    assert_eq!(score.structural, 100.0);
    assert_eq!(score.behavioral, 100.0);
    assert!((score.visual - 100.0).abs() < 1e-9);
    assert!(score.passed);
    assert!(score.findings.is_empty(), "{:?}", score.findings);
}

#[tokio::test]
async fn low_contrast_palette_is_flagged() {
    let mut spec = sample_spec();
    spec.visual.palette.primary = "#222222".into();
    spec.visual.palette.background = "#202020".into();

    let score = validator(StubTooling::passing(), StubSandbox::new(healthy_run()))
        .validate(&spec, &payload_for(&spec), &QualityThresholds::default())
        .await
        .unwrap();

    assert!(score.visual < 100.0);
    assert!(score
        .findings
        .iter()
        .any(|f| f.starts_with("visual: contrast primary_on_background")));
}

#[tokio::test]
async fn crash_zeroes_behavior_even_when_goals_were_reached() {
    let spec = sample_spec();
    let crashed = SimulationReport {
        crashed: true,
        crash_tick: Some(3),
        ..healthy_run()
    };

    let score = validator(StubTooling::passing(), StubSandbox::new(crashed))
        .validate(&spec, &payload_for(&spec), &QualityThresholds::default())
        .await
        .unwrap();

    assert_eq!(score.behavioral, 0.0);
    assert!(!score.behavioral_pass);
    assert!(!score.passed);
    assert!(score
        .findings
        .contains(&"behavioral: simulation crashed at tick 3".to_string()));
    assert!((score.overall - weighted_overall(score.structural, 0.0, score.visual)).abs() < 1e-9);
}

#[tokio::test]
async fn broken_build_drags_structural_score_down() {
    let spec = sample_spec();
    let tooling = StubTooling::passing()
        .with_compile(ToolReport::failed(vec!["simulation.ts:4 missing brace".into()]))
        .with_tests(TestReport {
            passed: 1,
            failed: 3,
            diagnostics: vec!["jump test timed out".into()],
        });

    let score = validator(tooling, StubSandbox::new(healthy_run()))
        .validate(&spec, &payload_for(&spec), &QualityThresholds::default())
        .await
        .unwrap();

    assert!(score.structural <= 5.0);
    assert!(!score.structural_pass);
    assert!(score
        .findings
        .contains(&"structural: does not compile".to_string()));
}

#[tokio::test]
async fn missing_tooling_is_an_infrastructure_error() {
    let spec = sample_spec();
    let err = validator(StubTooling::unavailable(), StubSandbox::new(healthy_run()))
        .validate(&spec, &payload_for(&spec), &QualityThresholds::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FactoryError::ValidatorInfrastructure { .. }));
    assert!(err.is_terminal());
}

#[tokio::test]
async fn sandbox_outage_is_an_infrastructure_error() {
    let spec = sample_spec();
    let err = validator(StubTooling::passing(), StubSandbox::unavailable())
        .validate(&spec, &payload_for(&spec), &QualityThresholds::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FactoryError::ValidatorInfrastructure { .. }));
}

#[tokio::test]
async fn sandbox_sees_only_declared_inputs() {
    let spec = sample_spec();
    let sandbox = Arc::new(StubSandbox::new(healthy_run()));
    let checker = BehavioralChecker::new(sandbox.clone());

    checker
        .check(&spec, &sample_logic_bundle(0.0).files)
        .await
        .unwrap();

    let received = sandbox.received_inputs();
    assert!(!received.is_empty());
    assert!(received
        .iter()
        .all(|event| spec.behavior.inputs.contains(&event.input)));
}
