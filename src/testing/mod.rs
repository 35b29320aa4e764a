//! Testing utilities and stub collaborators
//!
//! Every external seam of the pipeline has a scripted stand-in here so the
//! orchestrator and validators can be exercised without network access or
//! real build tooling.

pub mod fixtures;
pub mod mocks;

pub use fixtures::{sample_assets, sample_logic_bundle, sample_logic_files, sample_spec};
pub use mocks::{
    FailingImageGenerator, FixedSpecSource, MemorySink, ScriptedGate, ScriptedLlm,
    SolidImageGenerator, StoredArtifact, StubAssets, StubLogic, StubSandbox, StubTooling,
};

use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::fallback::FallbackSelector;
use crate::orchestrator::{GenerationOrchestrator, OrchestratorBuilder};

/// Wires an orchestrator from stubs, keeping handles for assertions
pub struct TestContext {
    pub spec_source: Arc<FixedSpecSource>,
    pub logic: Arc<StubLogic>,
    pub assets: Arc<StubAssets>,
    pub gate: Arc<ScriptedGate>,
    pub sink: Arc<MemorySink>,
    pub config: GenerationConfig,
}

impl TestContext {
    /// Stubs that produce passing content and score every attempt 100
    pub fn new() -> Self {
        let mut config = GenerationConfig::default();
        config.backoff.initial_delay = std::time::Duration::from_millis(10);
        config.backoff.max_delay = std::time::Duration::from_millis(80);
        Self {
            spec_source: Arc::new(FixedSpecSource::new(sample_spec(), 0.0)),
            logic: Arc::new(StubLogic::new(0.0)),
            assets: Arc::new(StubAssets::new(0.0)),
            gate: Arc::new(ScriptedGate::always(100.0)),
            sink: Arc::new(MemorySink::new()),
            config,
        }
    }

    pub fn with_spec_source(mut self, source: FixedSpecSource) -> Self {
        self.spec_source = Arc::new(source);
        self
    }

    pub fn with_logic(mut self, logic: StubLogic) -> Self {
        self.logic = Arc::new(logic);
        self
    }

    pub fn with_assets(mut self, assets: StubAssets) -> Self {
        self.assets = Arc::new(assets);
        self
    }

    pub fn with_gate(mut self, gate: ScriptedGate) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    pub fn with_sink(mut self, sink: MemorySink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut GenerationConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Builder preloaded with every stub; tests may override parts
    pub fn builder(&self) -> OrchestratorBuilder {
        GenerationOrchestrator::builder()
            .spec_source(self.spec_source.clone())
            .logic(self.logic.clone())
            .assets(self.assets.clone())
            .validator(self.gate.clone())
            .fallback(Arc::new(FallbackSelector::default()))
            .sink(self.sink.clone())
    }

    pub fn orchestrator(&self) -> GenerationOrchestrator {
        match self.builder().build() {
            Ok(orchestrator) => orchestrator,
            Err(e) => panic!("test orchestrator is missing a part: {}", e),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
