//! Raster asset generation.
//!
//! Three images per spec, each with its own prompt. A failed or timed-out
//! image call never fails the generator; a placeholder of the right size
//! is substituted instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::color::Rgb;
use super::png;
use super::{ContentGenerator, ContentStage};
use crate::abstractions::ImageGenerator;
use crate::error::{FactoryError, Result};
use crate::spec::ArtifactSpecification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Vertical title screen art
    Title,
    /// Vertical ambient menu background
    Menu,
    /// Horizontal in-activity background
    Gameplay,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Title, AssetKind::Menu, AssetKind::Gameplay];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AssetKind::Title | AssetKind::Menu => (1080, 1920),
            AssetKind::Gameplay => (1920, 1080),
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            AssetKind::Title => "title.png",
            AssetKind::Menu => "menu.png",
            AssetKind::Gameplay => "gameplay.png",
        }
    }

    /// Prompt for this asset, built from the spec's concept, mood and palette
    pub fn prompt(self, spec: &ArtifactSpecification) -> String {
        let palette = &spec.visual.palette;
        let colors = format!(
            "primary {}, secondary {}, accent {}, background {}",
            palette.primary, palette.secondary, palette.accent, palette.background
        );
        let style = format!(
            "{} mood, {} style, {} iconography",
            spec.visual.mood, spec.visual.ui_style, spec.visual.iconography
        );
        match self {
            AssetKind::Title => format!(
                "Portrait title screen key art for the mobile game \"{}\". {} \
                 Bold central composition with empty space in the upper third for a logo. \
                 {}. Colors: {}. No text.",
                spec.name, spec.concept, style, colors
            ),
            AssetKind::Menu => format!(
                "Portrait ambient menu background for \"{}\". Soft, low-detail scenery that \
                 sits quietly behind buttons. {}. Colors: {}. No characters, no text.",
                spec.name, style, colors
            ),
            AssetKind::Gameplay => {
                let entities: Vec<&str> = spec
                    .behavior
                    .entities
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect();
                format!(
                    "Landscape in-game background for \"{}\". Core activity: {}. \
                     Leave a clear play area for {}. {}. Colors: {}. No UI, no text.",
                    spec.name,
                    spec.behavior.core_loop.trim_end_matches('.'),
                    entities.join(", "),
                    style,
                    colors
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub kind: AssetKind,
    pub width: u32,
    pub height: u32,
    /// Encoded PNG
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// True when the image collaborator failed and a placeholder was used
    pub placeholder: bool,
    pub prompt: String,
}

impl ImageAsset {
    pub fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }

    /// Placeholder in the spec's background color, marked with its accent
    pub fn placeholder(kind: AssetKind, spec: &ArtifactSpecification, prompt: String) -> Self {
        let palette = &spec.visual.palette;
        let fill = Rgb::parse(&palette.background).unwrap_or(Rgb::new(0x20, 0x20, 0x20));
        let mark = Rgb::parse(&palette.accent).unwrap_or_else(|| fill.readable_on());
        let (width, height) = kind.dimensions();
        Self {
            kind,
            width,
            height,
            bytes: png::encode_placeholder(width, height, fill, mark),
            placeholder: true,
            prompt,
        }
    }
}

/// Asset stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBundle {
    pub assets: Vec<ImageAsset>,
    pub cost: f64,
}

impl AssetBundle {
    /// Placeholders for every asset kind; costs nothing
    pub fn placeholders(spec: &ArtifactSpecification) -> Self {
        Self {
            assets: AssetKind::ALL
                .iter()
                .map(|&kind| ImageAsset::placeholder(kind, spec, kind.prompt(spec)))
                .collect(),
            cost: 0.0,
        }
    }

    pub fn placeholder_count(&self) -> usize {
        self.assets.iter().filter(|a| a.placeholder).count()
    }
}

pub struct AssetGenerator {
    images: Arc<dyn ImageGenerator>,
    timeout: Duration,
}

impl AssetGenerator {
    pub fn new(images: Arc<dyn ImageGenerator>, timeout: Duration) -> Self {
        Self { images, timeout }
    }

    async fn produce(&self, kind: AssetKind, spec: &ArtifactSpecification) -> (ImageAsset, f64) {
        let prompt = kind.prompt(spec);
        let (width, height) = kind.dimensions();

        let result = match tokio::time::timeout(
            self.timeout,
            self.images.generate_image(&prompt, width, height),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FactoryError::collaborator_timeout("image", self.timeout)),
        };

        match result {
            Ok(image) => {
                debug!(asset = ?kind, bytes = image.bytes.len(), "Generated asset");
                let asset = ImageAsset {
                    kind,
                    width,
                    height,
                    bytes: image.bytes,
                    placeholder: false,
                    prompt,
                };
                (asset, image.cost)
            }
            Err(e) => {
                warn!(asset = ?kind, error = %e, "Image generation failed, using placeholder");
                (ImageAsset::placeholder(kind, spec, prompt), 0.0)
            }
        }
    }
}

#[async_trait]
impl ContentGenerator<AssetBundle> for AssetGenerator {
    fn stage(&self) -> ContentStage {
        ContentStage::Assets
    }

    async fn generate(
        &self,
        spec: &ArtifactSpecification,
        _feedback: Option<&str>,
    ) -> Result<AssetBundle> {
        let produced =
            futures::future::join_all(AssetKind::ALL.iter().map(|&kind| self.produce(kind, spec)))
                .await;

        let cost = produced.iter().map(|(_, cost)| cost).sum();
        Ok(AssetBundle {
            assets: produced.into_iter().map(|(asset, _)| asset).collect(),
            cost,
        })
    }
}
