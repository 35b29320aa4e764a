//! Artifact specification model
//!
//! An [`ArtifactSpecification`] is created once by the spec generator and
//! then shared read-only (behind an `Arc`) with every downstream component.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::content::color::Rgb;
use crate::error::{ErrorCode, FactoryError, Result};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

static CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:[ _-][a-z0-9]+)*$").expect("valid category regex"));

const MAX_ID_LEN: usize = 64;
const MAX_CATEGORY_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpecification {
    /// Stable, path-safe slug
    pub id: String,
    pub name: String,
    /// One or two sentence pitch
    pub concept: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub behavior: BehaviorRules,
    pub visual: VisualDescriptor,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRules {
    pub category: Category,
    pub inputs: Vec<InteractionInput>,
    /// The repeating core activity
    pub core_loop: String,
    pub success_condition: String,
    pub failure_condition: String,
    pub entities: Vec<Entity>,
    pub scoring: ScoringRule,
}

/// Open-ended gameplay category.
///
/// Any lower-case label passes as long as it is well formed, so novel
/// categories are never rejected for being unfamiliar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() || normalized.len() > MAX_CATEGORY_LEN {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_INVALID_VALUE,
                format!("category must be 1-{} characters", MAX_CATEGORY_LEN),
                Some("behavior.category"),
            ));
        }
        if !CATEGORY_RE.is_match(&normalized) {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_INVALID_VALUE,
                format!("category '{}' is not a simple label", raw),
                Some("behavior.category"),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Category::new(&value).map_err(|e| e.user_message())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed vocabulary of player inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionInput {
    PrimaryTap,
    SecondaryTap,
    LongPress,
    Drag,
    Swipe,
    VirtualButtons,
}

impl InteractionInput {
    pub const ALL: [InteractionInput; 6] = [
        InteractionInput::PrimaryTap,
        InteractionInput::SecondaryTap,
        InteractionInput::LongPress,
        InteractionInput::Drag,
        InteractionInput::Swipe,
        InteractionInput::VirtualButtons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionInput::PrimaryTap => "primary_tap",
            InteractionInput::SecondaryTap => "secondary_tap",
            InteractionInput::LongPress => "long_press",
            InteractionInput::Drag => "drag",
            InteractionInput::Swipe => "swipe",
            InteractionInput::VirtualButtons => "virtual_buttons",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub role: EntityRole,
    pub behavior: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Player,
    Antagonist,
    Obstacle,
    Collectible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub metric: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDescriptor {
    pub mood: String,
    pub palette: Palette,
    pub ui_style: String,
    pub font_style: String,
    pub iconography: String,
}

/// Four `#RRGGBB` colors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
}

impl Palette {
    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("accent", &self.accent),
            ("background", &self.background),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: u32,
    pub name: String,
    pub difficulty: Difficulty,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    VeryHard,
}

/// Stage parameter value: numeric or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// Compact view of a prior specification, embedded in generation prompts
/// and compared against during novelty scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecSummary {
    pub id: String,
    pub name: String,
    pub concept: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InteractionInput>,
}

/// Optional designer steering for spec generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignHints {
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub visual_style: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Themes, mechanics or names the new spec must stay away from
    #[serde(default)]
    pub avoid: Vec<String>,
}

impl DesignHints {
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.difficulty.is_none()
            && self.visual_style.is_none()
            && self.category.is_none()
            && self.avoid.is_empty()
    }
}

impl ArtifactSpecification {
    /// Parse a JSON document, separating malformed syntax from schema
    /// violations
    pub fn from_json(document: &str) -> Result<Self> {
        serde_json::from_str(document).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => {
                let message = e.to_string();
                let code = if message.contains("unknown variant") {
                    ErrorCode::SPEC_VOCABULARY
                } else if message.contains("missing field") {
                    ErrorCode::SPEC_MISSING_FIELD
                } else {
                    ErrorCode::SPEC_INVALID_VALUE
                };
                FactoryError::validation(code, message, None)
            }
            _ => FactoryError::parse(e.to_string()),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every structural invariant
    pub fn validate(&self, stage_count: usize) -> Result<()> {
        if self.id.len() > MAX_ID_LEN || !SLUG_RE.is_match(&self.id) {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_INVALID_ID,
                format!(
                    "id '{}' must be a lower-case slug of at most {} characters",
                    self.id, MAX_ID_LEN
                ),
                Some("id"),
            ));
        }

        let required = [
            ("name", &self.name),
            ("concept", &self.concept),
            ("behavior.core_loop", &self.behavior.core_loop),
            ("behavior.success_condition", &self.behavior.success_condition),
            ("behavior.failure_condition", &self.behavior.failure_condition),
            ("behavior.scoring.metric", &self.behavior.scoring.metric),
            ("visual.mood", &self.visual.mood),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(FactoryError::validation(
                    ErrorCode::SPEC_MISSING_FIELD,
                    format!("{} is empty", field),
                    Some(field),
                ));
            }
        }

        if self.behavior.inputs.is_empty() {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_MISSING_FIELD,
                "at least one interaction input is required",
                Some("behavior.inputs"),
            ));
        }
        if self.behavior.entities.is_empty() {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_MISSING_FIELD,
                "at least one entity is required",
                Some("behavior.entities"),
            ));
        }
        if let Some(entity) = self.behavior.entities.iter().find(|e| e.name.trim().is_empty()) {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_MISSING_FIELD,
                format!("entity with role {:?} has no name", entity.role),
                Some("behavior.entities"),
            ));
        }

        for (slot, color) in self.visual.palette.entries() {
            if Rgb::parse(color).is_none() {
                return Err(FactoryError::validation(
                    ErrorCode::SPEC_INVALID_VALUE,
                    format!("palette.{} '{}' is not a #RRGGBB color", slot, color),
                    Some("visual.palette"),
                ));
            }
        }

        if self.stages.len() != stage_count {
            return Err(FactoryError::validation(
                ErrorCode::SPEC_STAGE_COUNT,
                format!(
                    "expected exactly {} stages, found {}",
                    stage_count,
                    self.stages.len()
                ),
                Some("stages"),
            ));
        }
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id) {
                return Err(FactoryError::validation(
                    ErrorCode::SPEC_INVALID_VALUE,
                    format!("stage id {} appears more than once", stage.id),
                    Some("stages"),
                ));
            }
        }

        Ok(())
    }

    /// Stage positions where difficulty drops relative to the previous
    /// stage. Advisory only.
    pub fn difficulty_regressions(&self) -> Vec<u32> {
        self.stages
            .windows(2)
            .filter(|pair| pair[1].difficulty < pair[0].difficulty)
            .map(|pair| pair[1].id)
            .collect()
    }

    pub fn summary(&self) -> SpecSummary {
        SpecSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            concept: self.concept.clone(),
            tags: self.tags.clone(),
            category: Some(self.behavior.category.as_str().to_string()),
            mood: Some(self.visual.mood.clone()),
            inputs: self.behavior.inputs.clone(),
        }
    }

    /// A complete, valid specification used as the prompt's worked example
    /// and as the stand-in when spec generation is allowed to be skipped
    pub fn default_spec(stage_count: usize) -> Self {
        let tiers = [
            Difficulty::Easy,
            Difficulty::Medium,
            Difficulty::Hard,
            Difficulty::VeryHard,
        ];
        let stages = (0..stage_count)
            .map(|i| {
                let tier = tiers[(i * tiers.len()) / stage_count.max(1)];
                let mut parameters = BTreeMap::new();
                parameters.insert(
                    "spawn_rate".to_string(),
                    ParamValue::Number(1.0 + i as f64 * 0.25),
                );
                parameters.insert(
                    "target_score".to_string(),
                    ParamValue::Number(100.0 * (i as f64 + 1.0)),
                );
                Stage {
                    id: i as u32 + 1,
                    name: format!("Stage {}", i + 1),
                    difficulty: tier,
                    description: format!("Reach {} points", 100 * (i + 1)),
                    parameters,
                }
            })
            .collect();

        Self {
            id: "sky-hopper".to_string(),
            name: "Sky Hopper".to_string(),
            concept: "Hop between drifting clouds and collect stars before the storm arrives."
                .to_string(),
            tags: vec!["casual".into(), "jumping".into(), "sky".into()],
            behavior: BehaviorRules {
                category: Category("platformer".to_string()),
                inputs: vec![InteractionInput::PrimaryTap],
                core_loop: "Tap to jump to the next cloud while collecting stars.".to_string(),
                success_condition: "Reach the stage target score.".to_string(),
                failure_condition: "Fall below the lowest cloud.".to_string(),
                entities: vec![
                    Entity {
                        name: "Hopper".into(),
                        role: EntityRole::Player,
                        behavior: "Jumps upward on tap, falls with gravity.".into(),
                    },
                    Entity {
                        name: "Star".into(),
                        role: EntityRole::Collectible,
                        behavior: "Floats in place, awards points on contact.".into(),
                    },
                    Entity {
                        name: "Storm Cloud".into(),
                        role: EntityRole::Obstacle,
                        behavior: "Drifts sideways and ends the run on contact.".into(),
                    },
                ],
                scoring: ScoringRule {
                    metric: "points".into(),
                    description: "10 points per star, 1 point per cloud climbed.".into(),
                },
            },
            visual: VisualDescriptor {
                mood: "calm".into(),
                palette: Palette {
                    primary: "#4A90D9".into(),
                    secondary: "#F5A623".into(),
                    accent: "#FFFFFF".into(),
                    background: "#0B1D3A".into(),
                },
                ui_style: "rounded".into(),
                font_style: "friendly sans".into(),
                iconography: "soft outlined".into(),
            },
            stages,
        }
    }
}
