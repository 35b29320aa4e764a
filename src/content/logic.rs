//! Logic source generation and the fast static shape check.
//!
//! Generated source must arrive as exactly three units: entity
//! definitions, the update/simulation step, and the screen integration.
//! The static check runs before any build tooling so obviously broken
//! output is rejected without paying for a compile.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ContentGenerator, ContentStage, SourceFile};
use crate::abstractions::{Completion, LlmClient};
use crate::cancel::CancellationToken;
use crate::config::GenerationConfig;
use crate::error::{FactoryError, Result};
use crate::prompt::PromptEngine;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::spec::ArtifactSpecification;

static FILE_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?://|#)[ \t]*file:[ \t]*(\S+)[ \t]*$").expect("valid marker regex")
});

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["']([^"'\s]+)["']"#).expect("valid quote regex"));

const LOGIC_TEMPLATE: &str = r#"Write the game logic for the specification below.

Return exactly three source units, each introduced by a marker line:
{% for unit in units %}// file: {{ unit }}.ts
{% endfor %}
Rules:
- `entities` exports one class per entity ({{ entity_names | join(sep=", ") }}).
- `simulation` exports an `update(state, dt)` function that advances one tick.
- `integration` has a default export wiring entities and simulation into the
  screen and uses at least one lifecycle hook ({{ hooks | join(sep=", ") }}).
- Use only the sanctioned runtime: physics and collision helpers, the input
  events {{ inputs | join(sep=", ") }}, rendering primitives, lifecycle hooks.
- Do not import any of: {{ denied | join(sep=", ") }}.
- No TODO or FIXME placeholders; every function must be complete.
{% if feedback %}
The previous attempt was rejected. Fix these problems:
{{ feedback }}
{% endif %}
Specification:
{{ spec_json }}
"#;

/// Static check configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCheckRules {
    /// Unit names, in order: entities, simulation, integration
    pub units: Vec<String>,
    /// Must match in the entities unit
    pub entity_pattern: String,
    /// Must match in the simulation unit
    pub update_pattern: String,
    /// Must match in the integration unit
    pub integration_pattern: String,
    /// At least one must appear somewhere
    pub lifecycle_hooks: Vec<String>,
    pub placeholder_pattern: String,
    /// Module roots that may not be imported
    pub denied_libraries: Vec<String>,
}

impl Default for StaticCheckRules {
    fn default() -> Self {
        Self {
            units: vec!["entities".into(), "simulation".into(), "integration".into()],
            entity_pattern: r"(?m)^\s*export\s+(?:abstract\s+)?(?:class|interface|type)\s+[A-Z]\w*"
                .into(),
            update_pattern: r"\bupdate\s*\(".into(),
            integration_pattern: r"(?m)^\s*export\s+default\b".into(),
            lifecycle_hooks: ["onLoad", "onMount", "onStart", "onResize", "onRemove"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            placeholder_pattern: r"\b(?:TODO|FIXME)\b".into(),
            denied_libraries: [
                "phaser",
                "pixi.js",
                "three",
                "babylonjs",
                "@babylonjs",
                "matter-js",
                "planck-js",
                "cannon-es",
                "kaboom",
                "excalibur",
                "cocos2d",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Compiled form of [`StaticCheckRules`]
#[derive(Debug, Clone)]
pub struct StaticChecker {
    rules: StaticCheckRules,
    entity: Regex,
    update: Regex,
    integration: Regex,
    placeholder: Regex,
}

impl StaticChecker {
    pub fn new(rules: StaticCheckRules) -> Result<Self> {
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                FactoryError::config(format!("static check pattern '{}' is invalid: {}", name, e))
            })
        };
        Ok(Self {
            entity: compile("entity_pattern", &rules.entity_pattern)?,
            update: compile("update_pattern", &rules.update_pattern)?,
            integration: compile("integration_pattern", &rules.integration_pattern)?,
            placeholder: compile("placeholder_pattern", &rules.placeholder_pattern)?,
            rules,
        })
    }

    pub fn rules(&self) -> &StaticCheckRules {
        &self.rules
    }

    /// All violations found; empty means the shape is acceptable
    pub fn check(&self, files: &[SourceFile]) -> Vec<String> {
        let mut violations = Vec::new();

        let unit = |name: &str| files.iter().find(|f| f.stem() == name);
        let [entities, simulation, integration] = match self.rules.units.as_slice() {
            [a, b, c] => [a.as_str(), b.as_str(), c.as_str()],
            _ => {
                return vec!["static check must name exactly three units".to_string()];
            }
        };

        for name in [entities, simulation, integration] {
            if unit(name).is_none() {
                violations.push(format!("missing source unit '{}'", name));
            }
        }
        if files.len() != 3 {
            violations.push(format!("expected 3 source units, found {}", files.len()));
        }

        if let Some(file) = unit(entities) {
            if !self.entity.is_match(&file.contents) {
                violations.push(format!("{}: no exported entity type", file.path));
            }
        }
        if let Some(file) = unit(simulation) {
            if !self.update.is_match(&file.contents) {
                violations.push(format!("{}: no update function", file.path));
            }
        }
        if let Some(file) = unit(integration) {
            if !self.integration.is_match(&file.contents) {
                violations.push(format!("{}: integration unit has no default export", file.path));
            }
        }

        let uses_hook = files.iter().any(|f| {
            self.rules
                .lifecycle_hooks
                .iter()
                .any(|hook| f.contents.contains(hook.as_str()))
        });
        if !uses_hook {
            violations.push("no lifecycle hook is used".to_string());
        }

        for file in files {
            if let Some(m) = self.placeholder.find(&file.contents) {
                violations.push(format!("{}: placeholder marker '{}'", file.path, m.as_str()));
            }
            for library in self.denied_imports(&file.contents) {
                violations.push(format!("{}: imports denied library '{}'", file.path, library));
            }
        }

        violations
    }

    fn denied_imports(&self, contents: &str) -> Vec<String> {
        let mut found = Vec::new();
        for line in contents.lines() {
            let trimmed = line.trim_start();
            let is_import = trimmed.starts_with("import ")
                || (trimmed.starts_with("export ") && trimmed.contains(" from "))
                || trimmed.contains("require(");
            if !is_import {
                continue;
            }
            for capture in QUOTED_RE.captures_iter(trimmed) {
                let root = module_root(&capture[1]).to_lowercase();
                let denied = self.rules.denied_libraries.iter().any(|d| {
                    root == d.as_str()
                        || root
                            .strip_prefix(d.as_str())
                            .is_some_and(|rest| rest.starts_with('/'))
                });
                if denied && !found.contains(&root)
                {
                    found.push(root);
                }
            }
        }
        found
    }
}

/// `@scope/pkg/sub` -> `@scope/pkg`, `pkg/sub` -> `pkg`
fn module_root(specifier: &str) -> &str {
    let mut parts = specifier.splitn(3, '/');
    match (parts.next(), parts.next()) {
        (Some(scope), Some(name)) if scope.starts_with('@') => {
            &specifier[..scope.len() + 1 + name.len()]
        }
        (Some(first), _) => first,
        _ => specifier,
    }
}

/// Split a marked-up completion into source units.
///
/// Code fence lines are dropped; each `// file: name` marker starts a unit
/// that runs to the next marker.
pub fn split_units(text: &str) -> Result<Vec<SourceFile>> {
    let cleaned: String = text
        .lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let markers: Vec<_> = FILE_MARKER_RE.captures_iter(&cleaned).collect();
    if markers.is_empty() {
        return Err(FactoryError::structural(vec![
            "response contains no `// file:` unit markers".to_string(),
        ]));
    }

    let mut files = Vec::with_capacity(markers.len());
    for (i, capture) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (capture.get(0), capture.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(cleaned.len());
        let body = cleaned[whole.end()..end].trim();
        files.push(SourceFile::new(name.as_str(), format!("{}\n", body)));
    }
    Ok(files)
}

/// Logic stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicBundle {
    pub files: Vec<SourceFile>,
    pub cost: f64,
}

#[derive(Serialize)]
struct LogicPromptContext<'a> {
    units: &'a [String],
    entity_names: Vec<&'a str>,
    hooks: &'a [String],
    inputs: Vec<&'static str>,
    denied: &'a [String],
    feedback: Option<&'a str>,
    spec_json: String,
}

/// Generates logic source through the LLM collaborator
pub struct LogicGenerator {
    llm: Arc<dyn LlmClient>,
    checker: StaticChecker,
    prompts: PromptEngine,
    retry: RetryConfig,
    timeout: Duration,
    cancel: CancellationToken,
}

impl LogicGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut prompts = PromptEngine::new();
        prompts.register("logic", LOGIC_TEMPLATE)?;
        Ok(Self {
            llm,
            checker: StaticChecker::new(StaticCheckRules::default())?,
            prompts,
            retry: config.collaborator_retry.clone(),
            timeout: config.timeouts.logic_call,
            cancel,
        })
    }

    pub fn with_checker(mut self, checker: StaticChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn build_prompt(
        &self,
        spec: &ArtifactSpecification,
        feedback: Option<&str>,
    ) -> Result<String> {
        let rules = self.checker.rules();
        let context = LogicPromptContext {
            units: &rules.units,
            entity_names: spec
                .behavior
                .entities
                .iter()
                .map(|e| e.name.as_str())
                .collect(),
            hooks: &rules.lifecycle_hooks,
            inputs: spec.behavior.inputs.iter().map(|i| i.as_str()).collect(),
            denied: &rules.denied_libraries,
            feedback: feedback.filter(|f| !f.trim().is_empty()),
            spec_json: spec.to_json()?,
        };
        self.prompts.render("logic", &context)
    }

    async fn call(&self, prompt: &str) -> Result<Completion> {
        match tokio::time::timeout(self.timeout, self.llm.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(FactoryError::collaborator_timeout("llm", self.timeout)),
        }
    }
}

#[async_trait]
impl ContentGenerator<LogicBundle> for LogicGenerator {
    fn stage(&self) -> ContentStage {
        ContentStage::Logic
    }

    async fn generate(
        &self,
        spec: &ArtifactSpecification,
        feedback: Option<&str>,
    ) -> Result<LogicBundle> {
        let prompt = self.build_prompt(spec, feedback)?;
        debug!(spec_id = %spec.id, prompt_len = prompt.len(), "Requesting logic source");

        let executor = RetryExecutor::new(self.retry.clone(), self.cancel.clone());
        let this = self;
        let prompt_ref = prompt.as_str();
        let completion = executor
            .execute_with_retry(move || this.call(prompt_ref), "logic generation")
            .await
            .map_err(|e| {
                if e.is_transient() {
                    FactoryError::generation(ContentStage::Logic, e.to_string())
                } else {
                    e
                }
            })?;

        let files = split_units(&completion.text).map_err(|e| e.with_cost(completion.cost))?;
        let violations = self.checker.check(&files);
        if !violations.is_empty() {
            warn!(
                spec_id = %spec.id,
                count = violations.len(),
                "Generated logic failed static check"
            );
            return Err(FactoryError::structural(violations).with_cost(completion.cost));
        }

        Ok(LogicBundle {
            files,
            cost: completion.cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_LOGIC: &str = r#"Here you go:
```ts
// file: entities.ts
export class Hopper { y = 0; }
export class Star { collected = false; }
```
```ts
// file: simulation.ts
import { Hopper } from './entities';
export function update(state, dt) { state.hopper.y += dt; }
```
```ts
// file: integration.ts
import { update } from './simulation';
export default class GameScreen { onLoad() { this.tick = update; } }
```
"#;

    fn files(text: &str) -> Vec<SourceFile> {
        split_units(text).unwrap()
    }

    fn checker() -> StaticChecker {
        StaticChecker::new(StaticCheckRules::default()).unwrap()
    }

    #[test]
    fn test_split_units_strips_fences() {
        let units = files(GOOD_LOGIC);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].path, "entities.ts");
        assert!(units[0].contents.starts_with("export class Hopper"));
        assert!(!units[2].contents.contains("```"));
    }

    #[test]
    fn test_split_without_markers_is_structural() {
        let err = split_units("export class A {}").unwrap_err();
        assert!(matches!(err, FactoryError::Structural { .. }));
    }

    #[test]
    fn test_clean_logic_passes() {
        assert!(checker().check(&files(GOOD_LOGIC)).is_empty());
    }

    #[test]
    fn test_placeholder_and_denied_library_flagged() {
        let text = GOOD_LOGIC
            .replace("state.hopper.y += dt;", "// TODO physics")
            .replace("import { Hopper } from './entities';", "import Phaser from 'phaser/src/core';");
        let violations = checker().check(&files(&text));
        assert!(violations.iter().any(|v| v.contains("TODO")));
        assert!(violations.iter().any(|v| v.contains("'phaser'")));
    }

    #[test]
    fn test_missing_markers_reported() {
        let text = GOOD_LOGIC
            .replace("export default class", "class")
            .replace("onLoad", "boot")
            .replace("export function update", "export function step");
        let violations = checker().check(&files(&text));
        assert!(violations.iter().any(|v| v.contains("default export")));
        assert!(violations.iter().any(|v| v.contains("lifecycle hook")));
        assert!(violations.iter().any(|v| v.contains("update function")));
    }

    #[test]
    fn test_missing_unit_reported() {
        let text = GOOD_LOGIC.replace("// file: integration.ts", "// file: screen.ts");
        let violations = checker().check(&files(&text));
        assert!(violations.iter().any(|v| v.contains("'integration'")));
    }

    #[test]
    fn test_word_three_in_prose_is_not_an_import() {
        let text = GOOD_LOGIC.replace(
            "export class Star { collected = false; }",
            "export class Star { lives = 'three'; }",
        );
        assert!(checker().check(&files(&text)).is_empty());
    }

    #[test]
    fn test_module_root() {
        assert_eq!(module_root("three/examples/jsm"), "three");
        assert_eq!(module_root("@babylonjs/core/Engines"), "@babylonjs/core");
        assert_eq!(module_root("phaser"), "phaser");
    }

    #[test]
    fn test_scoped_deny_entry_matches_subpackages() {
        let text = GOOD_LOGIC.replace(
            "import { update } from './simulation';",
            "import { Engine } from \"@babylonjs/core\";\nimport { update } from './simulation';",
        );
        let violations = checker().check(&files(&text));
        assert!(violations.iter().any(|v| v.contains("@babylonjs/core")));
    }

    #[test]
    fn test_invalid_rule_pattern_rejected() {
        let rules = StaticCheckRules {
            update_pattern: "(".into(),
            ..Default::default()
        };
        assert!(StaticChecker::new(rules).is_err());
    }
}
