//! Build correctness: compile, lint, bundled tests and the static shape check.

use std::sync::Arc;

use super::DimensionReport;
use crate::abstractions::BuildTooling;
use crate::content::{SourceFile, StaticChecker};
use crate::error::{FactoryError, Result};

const COMPILE_SHARE: f64 = 50.0;
const LINT_SHARE: f64 = 15.0;
const TESTS_SHARE: f64 = 20.0;
const STATIC_SHARE: f64 = 15.0;

/// Ceiling applied when the build does not compile
pub const COMPILE_FAILURE_CAP: f64 = 5.0;

/// Diagnostics echoed into findings per tool
const MAX_DIAGNOSTICS: usize = 3;

pub struct StructuralChecker {
    tooling: Arc<dyn BuildTooling>,
    static_checker: StaticChecker,
}

impl StructuralChecker {
    pub fn new(tooling: Arc<dyn BuildTooling>, static_checker: StaticChecker) -> Self {
        Self {
            tooling,
            static_checker,
        }
    }

    pub async fn check(&self, files: &[SourceFile]) -> Result<DimensionReport> {
        let (compile, lint, tests) = tokio::join!(
            self.tooling.compile(files),
            self.tooling.lint(files),
            self.tooling.run_tests(files),
        );
        let compile = compile.map_err(infrastructure("compile"))?;
        let lint = lint.map_err(infrastructure("lint"))?;
        let tests = tests.map_err(infrastructure("test runner"))?;
        let violations = self.static_checker.check(files);

        let mut findings = Vec::new();
        let mut score = 0.0;

        if compile.ok {
            score += COMPILE_SHARE;
        } else {
            findings.push("does not compile".to_string());
            findings.extend(compile.diagnostics.iter().take(MAX_DIAGNOSTICS).cloned());
        }

        if lint.ok {
            score += LINT_SHARE;
        } else {
            let issues = lint.diagnostics.len().max(1);
            score += LINT_SHARE * (1.0 - (issues.min(4) as f64) / 4.0);
            findings.push(format!("{} lint issue(s)", issues));
            findings.extend(lint.diagnostics.iter().take(MAX_DIAGNOSTICS).cloned());
        }

        // No bundled tests is not a failure
        if tests.total() == 0 {
            score += TESTS_SHARE;
        } else {
            score += TESTS_SHARE * tests.passed as f64 / tests.total() as f64;
            if tests.failed > 0 {
                findings.push(format!("{} of {} tests failed", tests.failed, tests.total()));
                findings.extend(tests.diagnostics.iter().take(MAX_DIAGNOSTICS).cloned());
            }
        }

        score += STATIC_SHARE * (1.0 - (violations.len().min(3) as f64) / 3.0);
        findings.extend(violations);

        if !compile.ok {
            score = score.min(COMPILE_FAILURE_CAP);
        }

        Ok(DimensionReport::new(score, findings))
    }
}

fn infrastructure(tool: &'static str) -> impl Fn(FactoryError) -> FactoryError {
    move |e| match e {
        FactoryError::ValidatorInfrastructure { .. } => e,
        other => FactoryError::validator_infrastructure(format!("{} unavailable: {}", tool, other)),
    }
}
