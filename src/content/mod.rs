//! Content generation: logic source, visual theme and image assets.
//!
//! All three generators share one contract,
//! [`ContentGenerator::generate`]`(spec, feedback)`, and are pure with
//! respect to their inputs, so the orchestrator can run them concurrently
//! within an attempt and re-run any of them on the next one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::spec::ArtifactSpecification;

pub mod assets;
pub mod color;
pub mod logic;
pub mod png;
pub mod theme;

pub use assets::{AssetBundle, AssetGenerator, AssetKind, ImageAsset};
pub use logic::{LogicBundle, LogicGenerator, StaticCheckRules, StaticChecker};
pub use theme::{ThemeGenerator, ThemePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStage {
    Logic,
    Theme,
    Assets,
}

impl fmt::Display for ContentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentStage::Logic => write!(f, "logic"),
            ContentStage::Theme => write!(f, "theme"),
            ContentStage::Assets => write!(f, "assets"),
        }
    }
}

/// Uniform generator contract.
///
/// `feedback` carries the previous attempt's validator failures so the next
/// try can be steered away from them; generators that cannot use it ignore
/// it.
#[async_trait]
pub trait ContentGenerator<T>: Send + Sync {
    fn stage(&self) -> ContentStage;

    async fn generate(&self, spec: &ArtifactSpecification, feedback: Option<&str>) -> Result<T>;
}

/// One named source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// File name without directory or extension
    pub fn stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.split('.').next().unwrap_or(name)
    }
}

/// Where a payload came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadOrigin {
    Generated { attempt: u32 },
    Fallback { baseline: String },
}

/// Everything produced for one specification in one attempt
#[derive(Debug, Clone)]
pub struct ArtifactPayload {
    pub logic: LogicBundle,
    pub theme: ThemePayload,
    pub assets: AssetBundle,
    pub origin: PayloadOrigin,
}

impl ArtifactPayload {
    pub fn cost(&self) -> f64 {
        self.logic.cost + self.assets.cost
    }

    /// Files handed to the output sink: logic units plus the serialized
    /// theme and specification
    pub fn output_files(&self, spec: &ArtifactSpecification) -> Result<Vec<SourceFile>> {
        let mut files = self.logic.files.clone();
        files.push(SourceFile::new(
            "theme.json",
            serde_json::to_string_pretty(&self.theme)?,
        ));
        files.push(SourceFile::new("spec.json", spec.to_json()?));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_stem() {
        assert_eq!(SourceFile::new("lib/game/entities.ts", "").stem(), "entities");
        assert_eq!(SourceFile::new("simulation.dart", "").stem(), "simulation");
        assert_eq!(SourceFile::new("integration", "").stem(), "integration");
    }

    #[test]
    fn test_origin_serializes_with_kind_tag() {
        let json = serde_json::to_string(&PayloadOrigin::Fallback {
            baseline: "tap-runner".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"fallback","baseline":"tap-runner"}"#);
    }
}
