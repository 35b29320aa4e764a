//! Build tooling and sandboxed execution used by quality validation
//!
//! An `Err` from any method here means the tooling itself could not run
//! (compiler missing, sandbox down). Bad code is reported through the
//! returned reports instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::SourceFile;
use crate::error::Result;
use crate::spec::InteractionInput;

/// Outcome of a compile or lint pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReport {
    pub ok: bool,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl ToolReport {
    pub fn ok() -> Self {
        Self {
            ok: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(diagnostics: Vec<String>) -> Self {
        Self {
            ok: false,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: u32,
    pub failed: u32,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl TestReport {
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }
}

#[async_trait]
pub trait BuildTooling: Send + Sync {
    async fn compile(&self, files: &[SourceFile]) -> Result<ToolReport>;
    async fn lint(&self, files: &[SourceFile]) -> Result<ToolReport>;
    async fn run_tests(&self, files: &[SourceFile]) -> Result<TestReport>;
}

/// One scripted input event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticInput {
    /// Tick at which the event fires
    pub tick: u64,
    pub input: InteractionInput,
    /// Normalized screen position in [0, 1]
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unhandled exception or freeze
    pub crashed: bool,
    #[serde(default)]
    pub crash_tick: Option<u64>,
    pub reached_success: bool,
    pub reached_failure: bool,
    pub ticks_per_second: f64,
}

#[async_trait]
pub trait SimulationSandbox: Send + Sync {
    async fn run_simulation(
        &self,
        files: &[SourceFile],
        inputs: &[SyntheticInput],
        tick_budget: u64,
    ) -> Result<SimulationReport>;
}
