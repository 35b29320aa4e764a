//! Build tooling and simulation sandbox stubs

use async_trait::async_trait;
use std::sync::Mutex;

use crate::abstractions::{
    BuildTooling, SimulationReport, SimulationSandbox, SyntheticInput, TestReport, ToolReport,
};
use crate::content::SourceFile;
use crate::error::{FactoryError, Result};

/// Build tooling with fixed reports
#[derive(Debug, Clone)]
pub struct StubTooling {
    compile: ToolReport,
    lint: ToolReport,
    tests: TestReport,
    available: bool,
}

impl StubTooling {
    /// Compiles, lints clean, four passing tests
    pub fn passing() -> Self {
        Self {
            compile: ToolReport::ok(),
            lint: ToolReport::ok(),
            tests: TestReport {
                passed: 4,
                failed: 0,
                diagnostics: Vec::new(),
            },
            available: true,
        }
    }

    /// Tooling that cannot run at all
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::passing()
        }
    }

    pub fn with_compile(mut self, report: ToolReport) -> Self {
        self.compile = report;
        self
    }

    pub fn with_lint(mut self, report: ToolReport) -> Self {
        self.lint = report;
        self
    }

    pub fn with_tests(mut self, report: TestReport) -> Self {
        self.tests = report;
        self
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(FactoryError::validator_infrastructure("compiler not installed"))
        }
    }
}

#[async_trait]
impl BuildTooling for StubTooling {
    async fn compile(&self, _files: &[SourceFile]) -> Result<ToolReport> {
        self.ensure_available()?;
        Ok(self.compile.clone())
    }

    async fn lint(&self, _files: &[SourceFile]) -> Result<ToolReport> {
        self.ensure_available()?;
        Ok(self.lint.clone())
    }

    async fn run_tests(&self, _files: &[SourceFile]) -> Result<TestReport> {
        self.ensure_available()?;
        Ok(self.tests.clone())
    }
}

/// Sandbox that returns one canned report and records the inputs it saw
#[derive(Debug)]
pub struct StubSandbox {
    report: Option<SimulationReport>,
    received: Mutex<Vec<SyntheticInput>>,
}

impl StubSandbox {
    pub fn new(report: SimulationReport) -> Self {
        Self {
            report: Some(report),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            report: None,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Inputs passed to the most recent simulation
    pub fn received_inputs(&self) -> Vec<SyntheticInput> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimulationSandbox for StubSandbox {
    async fn run_simulation(
        &self,
        _files: &[SourceFile],
        inputs: &[SyntheticInput],
        _tick_budget: u64,
    ) -> Result<SimulationReport> {
        *self.received.lock().unwrap() = inputs.to_vec();
        self.report
            .clone()
            .ok_or_else(|| FactoryError::validator_infrastructure("sandbox is down"))
    }
}
