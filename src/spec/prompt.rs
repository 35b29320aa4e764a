//! Spec generation prompt

use serde::Serialize;

use super::model::{ArtifactSpecification, DesignHints, InteractionInput, SpecSummary};
use crate::error::Result;
use crate::prompt::PromptEngine;

pub const SPEC_TEMPLATE_NAME: &str = "spec";

const SPEC_TEMPLATE: &str = r#"Design one new mobile game as a JSON specification.
{% if priors %}
These games already exist. Make something clearly different from all of them:
{% for p in priors %}- {{ p.id }}: {{ p.name }} ({{ p.tags | join(sep=", ") }}) {{ p.concept }}
{% endfor %}{% endif %}{% if hints %}
Designer direction:
{% if hints.tone %}- Tone: {{ hints.tone }}
{% endif %}{% if hints.difficulty %}- Difficulty: {{ hints.difficulty }}
{% endif %}{% if hints.visual_style %}- Visual style: {{ hints.visual_style }}
{% endif %}{% if hints.category %}- Suggested category: {{ hints.category }}
{% endif %}{% if hints.avoid %}- Avoid: {{ hints.avoid | join(sep=", ") }}
{% endif %}{% endif %}{% if correction %}
Your previous answer was rejected: {{ correction }}
Return a corrected document.
{% endif %}
Schema:
- id: lower-case slug (a-z, 0-9, single hyphens), unique among existing games
- name, concept (1-2 sentences), tags (list of words)
- behavior.category: any short lower-case label; invent one if none fits
- behavior.inputs: one or more of {{ inputs | join(sep=", ") }}
- behavior.core_loop, success_condition, failure_condition: prose
- behavior.entities: list of {name, role, behavior}; role is one of {{ roles | join(sep=", ") }}
- behavior.scoring: {metric, description}
- visual: {mood, palette {primary, secondary, accent, background as #RRGGBB}, ui_style, font_style, iconography}
- stages: exactly {{ stage_count }} entries of {id, name, difficulty, description, parameters};
  difficulty is one of {{ difficulties | join(sep=", ") }} and should not decrease;
  parameters maps names to numbers or strings

Example of a complete document:
{{ example }}

Respond with the JSON document only.
"#;

#[derive(Serialize)]
struct SpecPromptContext<'a> {
    priors: &'a [SpecSummary],
    hints: Option<&'a DesignHints>,
    correction: Option<&'a str>,
    inputs: Vec<&'static str>,
    roles: [&'static str; 4],
    difficulties: [&'static str; 4],
    stage_count: usize,
    example: String,
}

pub fn spec_prompt_engine() -> Result<PromptEngine> {
    let mut engine = PromptEngine::new();
    engine.register(SPEC_TEMPLATE_NAME, SPEC_TEMPLATE)?;
    Ok(engine)
}

/// Render the spec request.
///
/// `correction` carries the parse or validation error from the previous
/// local retry, if any.
pub fn render_spec_prompt(
    engine: &PromptEngine,
    priors: &[SpecSummary],
    hints: Option<&DesignHints>,
    correction: Option<&str>,
    stage_count: usize,
) -> Result<String> {
    let context = SpecPromptContext {
        priors,
        hints: hints.filter(|h| !h.is_empty()),
        correction,
        inputs: InteractionInput::ALL.iter().map(|i| i.as_str()).collect(),
        roles: ["player", "antagonist", "obstacle", "collectible"],
        difficulties: ["easy", "medium", "hard", "very_hard"],
        stage_count,
        example: ArtifactSpecification::default_spec(stage_count).to_json()?,
    };
    engine.render(SPEC_TEMPLATE_NAME, &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_priors_hints_and_example() {
        let engine = spec_prompt_engine().unwrap();
        let prior = ArtifactSpecification::default_spec(10).summary();
        let hints = DesignHints {
            tone: Some("whimsical".into()),
            avoid: vec!["zombies".into(), "cards".into()],
            ..Default::default()
        };
        let prompt = render_spec_prompt(&engine, &[prior], Some(&hints), None, 10).unwrap();

        assert!(prompt.contains("- sky-hopper: Sky Hopper (casual, jumping, sky)"));
        assert!(prompt.contains("Tone: whimsical"));
        assert!(prompt.contains("Avoid: zombies, cards"));
        assert!(prompt.contains("exactly 10 entries"));
        assert!(prompt.contains("virtual_buttons"));
        assert!(prompt.contains("\"very_hard\""));
        assert!(!prompt.contains("rejected"));
    }

    #[test]
    fn test_empty_hints_and_no_priors() {
        let engine = spec_prompt_engine().unwrap();
        let prompt = render_spec_prompt(
            &engine,
            &[],
            Some(&DesignHints::default()),
            Some("missing field `stages`"),
            10,
        )
        .unwrap();
        assert!(!prompt.contains("already exist"));
        assert!(!prompt.contains("Designer direction"));
        assert!(prompt.contains("rejected: missing field `stages`"));
    }
}
