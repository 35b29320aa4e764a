//! Fallback template selection.
//!
//! The guaranteed-success path: when no generated attempt is accepted the
//! orchestrator asks the selector for a baseline skeleton, re-skinned with
//! the spec's theme, stage table and assets. Selection cannot fail.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use crate::content::{
    ArtifactPayload, AssetBundle, LogicBundle, PayloadOrigin, SourceFile, ThemePayload,
};
use crate::error::Result;
use crate::prompt::PromptEngine;
use crate::spec::{similarity, ArtifactSpecification};

pub mod catalog;

pub use catalog::{Baseline, BaselineCatalog, BaselineUnits, GENERIC_BASELINE_ID};

/// Similarity below which a baseline is not considered a match
pub const MIN_MATCH_SCORE: f64 = 0.2;

/// A scored catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineMatch {
    pub baseline_id: String,
    pub score: f64,
}

pub struct FallbackSelector {
    catalog: BaselineCatalog,
    min_score: f64,
}

impl FallbackSelector {
    pub fn new(catalog: BaselineCatalog) -> Self {
        Self {
            catalog,
            min_score: MIN_MATCH_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn catalog(&self) -> &BaselineCatalog {
        &self.catalog
    }

    /// Every non-generic baseline, best first.
    ///
    /// Equal scores are ordered by stability, then by how recently the
    /// skeleton was revalidated.
    pub fn rank(&self, spec: &ArtifactSpecification) -> Vec<BaselineMatch> {
        let summary = spec.summary();
        let mut scored: Vec<(&Baseline, f64)> = self
            .catalog
            .baselines
            .iter()
            .filter(|b| !b.is_generic())
            .map(|b| (b, similarity(&summary, &b.summary()).total))
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.stability.cmp(&a.stability))
                .then_with(|| b.validated_on.cmp(&a.validated_on))
        });

        scored
            .into_iter()
            .map(|(b, score)| BaselineMatch {
                baseline_id: b.id.clone(),
                score,
            })
            .collect()
    }

    /// The baseline that would be used for `spec`
    pub fn choose(&self, spec: &ArtifactSpecification) -> BaselineMatch {
        self.rank(spec)
            .into_iter()
            .next()
            .filter(|m| m.score >= self.min_score)
            .unwrap_or_else(|| BaselineMatch {
                baseline_id: GENERIC_BASELINE_ID.to_string(),
                score: 0.0,
            })
    }

    /// Build the fallback payload.
    ///
    /// `assets` should be the last attempt's images when there were any;
    /// otherwise placeholders are used.
    pub fn select(
        &self,
        spec: &ArtifactSpecification,
        theme: &ThemePayload,
        assets: Option<AssetBundle>,
    ) -> ArtifactPayload {
        let chosen = self.choose(spec);
        let generic = BaselineCatalog::generic();
        let baseline = self.catalog.get(&chosen.baseline_id).unwrap_or(&generic);

        let files = match render_units(baseline, spec, theme) {
            Ok(files) => files,
            Err(e) => {
                warn!(baseline = %baseline.id, error = %e, "Baseline did not render, using generic skeleton");
                render_units(&generic, spec, theme).unwrap_or_else(|_| raw_units(&generic))
            }
        };

        info!(
            spec_id = %spec.id,
            baseline = %baseline.id,
            score = chosen.score,
            "Fallback baseline selected"
        );

        ArtifactPayload {
            logic: LogicBundle { files, cost: 0.0 },
            theme: theme.clone(),
            assets: assets.unwrap_or_else(|| AssetBundle::placeholders(spec)),
            origin: PayloadOrigin::Fallback {
                baseline: baseline.id.clone(),
            },
        }
    }
}

impl Default for FallbackSelector {
    fn default() -> Self {
        Self::new(BaselineCatalog::builtin())
    }
}

fn render_units(
    baseline: &Baseline,
    spec: &ArtifactSpecification,
    theme: &ThemePayload,
) -> Result<Vec<SourceFile>> {
    let mut engine = PromptEngine::new();
    engine.register("entities", &baseline.units.entities)?;
    engine.register("simulation", &baseline.units.simulation)?;
    engine.register("integration", &baseline.units.integration)?;

    let context = json!({
        "title_json": serde_json::to_string(&spec.name)?,
        "screen_class": screen_class(&spec.id),
        "stages_json": serde_json::to_string_pretty(&spec.stages)?,
        "palette_json": serde_json::to_string(&theme.colors)?,
    });

    let files = vec![
        SourceFile::new("entities.ts", engine.render("entities", &context)?),
        SourceFile::new("simulation.ts", engine.render("simulation", &context)?),
        SourceFile::new("integration.ts", engine.render("integration", &context)?),
    ];
    debug!(baseline = %baseline.id, "Rendered baseline units");
    Ok(files)
}

/// Unrendered skeleton; only reached if templating itself is broken
fn raw_units(baseline: &Baseline) -> Vec<SourceFile> {
    vec![
        SourceFile::new("entities.ts", baseline.units.entities.replace("{{ stages_json }}", "[]")),
        SourceFile::new("simulation.ts", baseline.units.simulation.clone()),
        SourceFile::new(
            "integration.ts",
            baseline
                .units
                .integration
                .replace("{{ screen_class }}", "Game")
                .replace("{{ title_json }}", "\"\"")
                .replace("{{ palette_json }}", "{}"),
        ),
    ]
}

/// `sky-hopper` -> `SkyHopper`
fn screen_class(id: &str) -> String {
    let class: String = id
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    match class.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => class,
        _ => format!("Game{}", class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::theme::derive_theme;
    use crate::content::{StaticCheckRules, StaticChecker};
    use crate::spec::{Category, InteractionInput};

    fn spec_like(category: &str, tags: &[&str], inputs: Vec<InteractionInput>) -> ArtifactSpecification {
        let mut spec = ArtifactSpecification::default_spec(10);
        spec.behavior.category = Category::new(category).unwrap();
        spec.tags = tags.iter().map(|t| t.to_string()).collect();
        spec.behavior.inputs = inputs;
        spec
    }

    #[test]
    fn test_closest_baseline_wins() {
        let spec = spec_like("runner", &["endless", "speed"], vec![InteractionInput::PrimaryTap]);
        let chosen = FallbackSelector::default().choose(&spec);
        assert_eq!(chosen.baseline_id, "tap-runner");
        assert!(chosen.score >= MIN_MATCH_SCORE);
    }

    #[test]
    fn test_ties_break_on_stability_then_recency() {
        // dodge-arena and tower-stack share stability 11; only the
        // validation date separates them
        let mut catalog = BaselineCatalog::builtin();
        for b in catalog.baselines.iter_mut() {
            b.category = Some("shared".into());
            b.tags = vec!["same".into()];
            b.inputs = vec![InteractionInput::Drag];
            b.mood = Some("calm".into());
        }
        let spec = spec_like("shared", &["same"], vec![InteractionInput::Drag]);
        let ranked = FallbackSelector::new(catalog).rank(&spec);
        let ids: Vec<_> = ranked.iter().map(|m| m.baseline_id.as_str()).collect();
        assert_eq!(ids, vec!["tap-runner", "dodge-arena", "tower-stack", "tile-match"]);
    }

    #[test]
    fn test_unrelated_spec_gets_generic() {
        let mut spec = spec_like("rhythm", &["music", "beats"], vec![InteractionInput::VirtualButtons]);
        spec.visual.mood = "melancholy".into();
        let chosen = FallbackSelector::default().choose(&spec);
        assert_eq!(chosen.baseline_id, GENERIC_BASELINE_ID);
    }

    #[test]
    fn test_payload_is_on_brand_and_passes_static_check() {
        let spec = ArtifactSpecification::default_spec(10);
        let theme = derive_theme(&spec.visual);
        let selector = FallbackSelector::default();

        for baseline in &selector.catalog().baselines {
            let files = render_units(baseline, &spec, &theme).unwrap();
            let violations = StaticChecker::new(StaticCheckRules::default())
                .unwrap()
                .check(&files);
            assert!(violations.is_empty(), "{}: {:?}", baseline.id, violations);
            assert!(files[0].contents.contains("\"target_score\": 1000.0"));
            assert!(files[2].contents.contains("class SkyHopperScreen"));
        }

        let payload = selector.select(&spec, &theme, None);
        assert_eq!(payload.theme, theme);
        assert_eq!(payload.assets.placeholder_count(), 3);
        assert_eq!(payload.cost(), 0.0);
        assert!(matches!(payload.origin, PayloadOrigin::Fallback { .. }));
    }

    #[test]
    fn test_screen_class_names() {
        assert_eq!(screen_class("sky-hopper"), "SkyHopper");
        assert_eq!(screen_class("2048-clone"), "Game2048Clone");
    }
}
