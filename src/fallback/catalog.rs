//! Baseline templates for the fallback path.
//!
//! Each baseline is a fixed, pre-validated logic skeleton with three
//! templated source units. Only the title, stage table and palette are
//! substituted, so every rendering passes the static check the skeleton
//! was validated against.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ErrorCode, FactoryError, Result};
use crate::spec::{InteractionInput, SpecSummary};

/// Id of the generic baseline used when nothing in the catalog is close
pub const GENERIC_BASELINE_ID: &str = "generic-arcade";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<InteractionInput>,
    #[serde(default)]
    pub mood: Option<String>,
    /// Date the skeleton was last revalidated
    pub validated_on: NaiveDate,
    /// Releases shipped on this skeleton without a logic defect
    #[serde(default)]
    pub stability: u32,
    pub units: BaselineUnits,
}

/// Tera sources for the three logic units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineUnits {
    pub entities: String,
    pub simulation: String,
    pub integration: String,
}

impl Baseline {
    /// Comparable view for similarity scoring
    pub fn summary(&self) -> SpecSummary {
        SpecSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            concept: String::new(),
            tags: self.tags.clone(),
            category: self.category.clone(),
            mood: self.mood.clone(),
            inputs: self.inputs.clone(),
        }
    }

    pub fn is_generic(&self) -> bool {
        self.id == GENERIC_BASELINE_ID
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineCatalog {
    pub baselines: Vec<Baseline>,
}

impl BaselineCatalog {
    /// Catalog shipped with the crate
    pub fn builtin() -> Self {
        Self {
            baselines: vec![
                builtin_baseline(
                    "tap-runner",
                    "Tap Runner",
                    "runner",
                    &["endless", "runner", "jump", "speed"],
                    &[InteractionInput::PrimaryTap],
                    "energetic",
                    (2025, 11, 3),
                    14,
                ),
                builtin_baseline(
                    "tile-match",
                    "Tile Match",
                    "puzzle",
                    &["match", "tiles", "puzzle", "casual"],
                    &[InteractionInput::Swipe, InteractionInput::PrimaryTap],
                    "calm",
                    (2026, 2, 17),
                    9,
                ),
                builtin_baseline(
                    "dodge-arena",
                    "Dodge Arena",
                    "arcade",
                    &["dodge", "survival", "arena", "reflex"],
                    &[InteractionInput::Drag],
                    "neon",
                    (2026, 4, 8),
                    11,
                ),
                builtin_baseline(
                    "tower-stack",
                    "Tower Stack",
                    "stacker",
                    &["stacking", "timing", "tower", "physics"],
                    &[InteractionInput::PrimaryTap],
                    "pastel",
                    (2026, 1, 22),
                    11,
                ),
                Self::generic(),
            ],
        }
    }

    /// The skeleton every request can fall back to
    pub fn generic() -> Baseline {
        Baseline {
            id: GENERIC_BASELINE_ID.to_string(),
            name: "Generic Arcade".to_string(),
            category: None,
            tags: Vec::new(),
            inputs: InteractionInput::ALL.to_vec(),
            mood: None,
            validated_on: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default(),
            stability: 40,
            units: default_units(),
        }
    }

    /// Load a YAML catalog. A missing generic baseline is added.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FactoryError::config_with_code(
                ErrorCode::CONFIG_NOT_FOUND,
                format!("cannot read baseline catalog {}: {}", path.display(), e),
            )
        })?;
        let mut catalog: Self = serde_yaml::from_str(&raw).map_err(|e| {
            FactoryError::config_with_code(
                ErrorCode::CONFIG_PARSE,
                format!("invalid baseline catalog {}: {}", path.display(), e),
            )
        })?;
        if !catalog.baselines.iter().any(Baseline::is_generic) {
            catalog.baselines.push(Self::generic());
        }
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&Baseline> {
        self.baselines.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

impl Default for BaselineCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[allow(clippy::too_many_arguments)]
fn builtin_baseline(
    id: &str,
    name: &str,
    category: &str,
    tags: &[&str],
    inputs: &[InteractionInput],
    mood: &str,
    validated_on: (i32, u32, u32),
    stability: u32,
) -> Baseline {
    let (y, m, d) = validated_on;
    Baseline {
        id: id.to_string(),
        name: name.to_string(),
        category: Some(category.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        inputs: inputs.to_vec(),
        mood: Some(mood.to_string()),
        validated_on: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        stability,
        units: BaselineUnits {
            entities: ENTITIES_TEMPLATE.replace("__PLAYER__", player_class(id)),
            simulation: SIMULATION_TEMPLATE.to_string(),
            integration: INTEGRATION_TEMPLATE.replace("__PLAYER__", player_class(id)),
        },
    }
}

fn player_class(id: &str) -> &'static str {
    match id {
        "tap-runner" => "Runner",
        "tile-match" => "Cursor",
        "dodge-arena" => "Dodger",
        "tower-stack" => "Block",
        _ => "Avatar",
    }
}

fn default_units() -> BaselineUnits {
    BaselineUnits {
        entities: ENTITIES_TEMPLATE.replace("__PLAYER__", "Avatar"),
        simulation: SIMULATION_TEMPLATE.to_string(),
        integration: INTEGRATION_TEMPLATE.replace("__PLAYER__", "Avatar"),
    }
}

const ENTITIES_TEMPLATE: &str = r#"export class __PLAYER__ {
  x = 0.5;
  y = 0.8;
  alive = true;
  score = 0;
}

export class Hazard {
  constructor(public x: number, public y: number, public speed: number) {}
}

export const STAGES = {{ stages_json }};
"#;

const SIMULATION_TEMPLATE: &str = r#"import { STAGES } from './entities';

export function update(state, dt) {
  const stage = STAGES[state.stage] || STAGES[STAGES.length - 1];
  const rate = Number(stage.parameters.spawn_rate || 1);
  state.elapsed += dt;
  state.spawnTimer -= dt * rate;
  if (state.spawnTimer <= 0) {
    state.spawn();
    state.spawnTimer = 1;
  }
  for (const hazard of state.hazards) {
    hazard.y += hazard.speed * dt;
    if (Math.abs(hazard.x - state.player.x) < 0.05 && Math.abs(hazard.y - state.player.y) < 0.05) {
      state.player.alive = false;
    }
  }
  state.player.score += dt;
  const target = Number(stage.parameters.target_score || 100);
  if (state.player.score >= target && state.stage < STAGES.length - 1) {
    state.stage += 1;
  }
  return state;
}
"#;

const INTEGRATION_TEMPLATE: &str = r#"import { __PLAYER__, Hazard, STAGES } from './entities';
import { update } from './simulation';

export default class {{ screen_class }}Screen {
  title = {{ title_json }};
  palette = {{ palette_json }};

  onLoad() {
    this.state = {
      player: new __PLAYER__(),
      hazards: [],
      stage: 0,
      elapsed: 0,
      spawnTimer: 1,
      spawn: () => this.state.hazards.push(new Hazard(Math.random(), 0, 0.4)),
    };
  }

  onInput(event) {
    this.state.player.x = Math.min(1, Math.max(0, event.x));
  }

  tick(dt) {
    this.state = update(this.state, dt);
    return this.state.player.alive;
  }

  stageCount() {
    return STAGES.length;
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog_has_generic() {
        let catalog = BaselineCatalog::builtin();
        assert!(catalog.get(GENERIC_BASELINE_ID).is_some());
        assert_eq!(catalog.len(), 5);
        let ids: std::collections::HashSet<_> = catalog.baselines.iter().map(|b| &b.id).collect();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn test_yaml_catalog_gains_generic_baseline() {
        let mut only_runner = BaselineCatalog::builtin();
        only_runner.baselines.truncate(1);
        let yaml = serde_yaml::to_string(&only_runner).unwrap();

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let loaded = BaselineCatalog::from_file(file.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.baselines[0].id, "tap-runner");
        assert!(loaded.baselines[1].is_generic());
    }

    #[test]
    fn test_unreadable_catalog_is_config_error() {
        let err = BaselineCatalog::from_file(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
    }
}
