//! Prompt templates rendered with tera

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{FactoryError, Result};

/// Named prompt templates.
///
/// Autoescaping is off: prompts embed JSON and source code verbatim.
pub struct PromptEngine {
    tera: Tera,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        Self { tera }
    }

    /// Register a template, failing on syntax errors
    pub fn register(&mut self, name: &str, template: &str) -> Result<()> {
        self.tera
            .add_raw_template(name, template)
            .map_err(|e| FactoryError::config(format!("Invalid prompt template '{}': {}", name, e)))
    }

    /// Render `name` with a serializable context
    pub fn render<C: Serialize>(&self, name: &str, values: &C) -> Result<String> {
        let context = Context::from_serialize(values)
            .map_err(|e| FactoryError::config(format!("Prompt context for '{}': {}", name, e)))?;
        self.tera
            .render(name, &context)
            .map_err(|e| FactoryError::config(format!("Template rendering failed: {}", e)))
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_without_escaping() {
        let mut engine = PromptEngine::new();
        engine
            .register("t", "Avoid: {% for a in avoid %}{{ a }}{% if not loop.last %}, {% endif %}{% endfor %}\n{{ doc }}")
            .unwrap();
        let out = engine
            .render("t", &json!({"avoid": ["<zombies>", "cards"], "doc": "{\"a\": 1}"}))
            .unwrap();
        assert_eq!(out, "Avoid: <zombies>, cards\n{\"a\": 1}");
    }

    #[test]
    fn test_bad_template_is_config_error() {
        let mut engine = PromptEngine::new();
        assert!(engine.register("broken", "{% if %}").is_err());
        assert!(engine.render("missing", &json!({})).is_err());
    }
}
