//! Deterministic theme derivation from a [`VisualDescriptor`].
//!
//! A mood label selects one of a fixed library of presets; the spec's
//! literal palette is substituted in and every other color is derived from
//! it. Never fails: malformed colors fall back to the preset's own palette
//! and unknown moods fall back to [`DEFAULT_PRESET`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::color::{Rgb, WCAG_AA_NORMAL};
use super::{ContentGenerator, ContentStage};
use crate::error::Result;
use crate::spec::{ArtifactSpecification, VisualDescriptor};

pub const DEFAULT_PRESET: &str = "calm";

/// WCAG 2.x minimum for non-text UI components against their background
pub const WCAG_NON_TEXT: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemePayload {
    /// Preset actually used
    pub preset: String,
    /// Mood label as written in the spec
    pub mood: String,
    pub colors: DerivedColors,
    pub typography: TypographyScale,
    pub motion: MotionProfile,
    pub spacing: SpacingScale,
    pub effects: EffectsProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedColors {
    pub primary: String,
    pub primary_light: String,
    pub primary_dark: String,
    pub on_primary: String,
    pub secondary: String,
    pub on_secondary: String,
    pub accent: String,
    pub on_accent: String,
    pub background: String,
    pub on_background: String,
    pub surface: String,
    pub surface_variant: String,
    pub on_surface: String,
    pub complement: String,
    pub error: String,
    pub on_error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypographyScale {
    pub font_hint: String,
    pub display: f32,
    pub headline: f32,
    pub title: f32,
    pub body: f32,
    pub caption: f32,
    pub heading_weight: u16,
    pub body_weight: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    pub speed_multiplier: f32,
    pub easing: String,
    pub transition_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingScale {
    pub unit: f32,
    pub corner_radius: f32,
    /// Elevation levels, lowest first
    pub elevation: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectsProfile {
    /// Particles per second at full intensity
    pub particle_density: u32,
    /// 0.0 (off) to 1.0
    pub screen_shake: f32,
    pub animated_background: bool,
}

/// A foreground/background pair the visual checker measures
#[derive(Debug, Clone, PartialEq)]
pub struct ContrastPair {
    pub name: &'static str,
    pub foreground: String,
    pub background: String,
    pub minimum: f64,
}

impl ThemePayload {
    /// Every foreground/background combination the theme implies
    pub fn contrast_pairs(&self) -> Vec<ContrastPair> {
        let c = &self.colors;
        let pair = |name, fg: &String, bg: &String, minimum| ContrastPair {
            name,
            foreground: fg.clone(),
            background: bg.clone(),
            minimum,
        };
        vec![
            pair("on_primary", &c.on_primary, &c.primary, WCAG_AA_NORMAL),
            pair("on_secondary", &c.on_secondary, &c.secondary, WCAG_AA_NORMAL),
            pair("on_accent", &c.on_accent, &c.accent, WCAG_AA_NORMAL),
            pair("on_background", &c.on_background, &c.background, WCAG_AA_NORMAL),
            pair("on_surface", &c.on_surface, &c.surface, WCAG_AA_NORMAL),
            pair("on_error", &c.on_error, &c.error, WCAG_AA_NORMAL),
            pair("primary_on_background", &c.primary, &c.background, WCAG_NON_TEXT),
            pair("accent_on_background", &c.accent, &c.background, WCAG_NON_TEXT),
            pair("secondary_on_surface", &c.secondary, &c.surface, WCAG_NON_TEXT),
        ]
    }
}

struct Preset {
    name: &'static str,
    keywords: &'static [&'static str],
    palette: [&'static str; 4],
    dark: bool,
    font_hint: &'static str,
    type_ratio: f32,
    heading_weight: u16,
    speed: f32,
    easing: &'static str,
    transition_ms: u32,
    spacing_unit: f32,
    corner_radius: f32,
    particles: u32,
    shake: f32,
    animated_background: bool,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "energetic",
        keywords: &["energetic", "action", "intense", "fast", "arcade", "hype"],
        palette: ["#FF3D00", "#FFC400", "#00E5FF", "#1A1A1A"],
        dark: true,
        font_hint: "bold condensed sans",
        type_ratio: 1.333,
        heading_weight: 800,
        speed: 1.4,
        easing: "ease-out-back",
        transition_ms: 180,
        spacing_unit: 8.0,
        corner_radius: 6.0,
        particles: 120,
        shake: 0.7,
        animated_background: true,
    },
    Preset {
        name: "calm",
        keywords: &["calm", "relaxing", "peaceful", "zen", "serene", "chill"],
        palette: ["#4A90D9", "#7FB3A6", "#F5E6C8", "#F4F7FA"],
        dark: false,
        font_hint: "rounded sans",
        type_ratio: 1.2,
        heading_weight: 600,
        speed: 0.8,
        easing: "ease-in-out",
        transition_ms: 400,
        spacing_unit: 10.0,
        corner_radius: 16.0,
        particles: 20,
        shake: 0.0,
        animated_background: false,
    },
    Preset {
        name: "dark",
        keywords: &["dark", "spooky", "horror", "gothic", "moody", "noir"],
        palette: ["#8E24AA", "#455A64", "#E53935", "#0D0D12"],
        dark: true,
        font_hint: "serif display",
        type_ratio: 1.25,
        heading_weight: 700,
        speed: 0.9,
        easing: "ease-in",
        transition_ms: 350,
        spacing_unit: 8.0,
        corner_radius: 2.0,
        particles: 40,
        shake: 0.4,
        animated_background: true,
    },
    Preset {
        name: "neon",
        keywords: &["neon", "cyberpunk", "synthwave", "electric", "glow"],
        palette: ["#FF00E6", "#00F0FF", "#FAFF00", "#0A0014"],
        dark: true,
        font_hint: "geometric mono",
        type_ratio: 1.333,
        heading_weight: 700,
        speed: 1.3,
        easing: "linear",
        transition_ms: 200,
        spacing_unit: 8.0,
        corner_radius: 0.0,
        particles: 100,
        shake: 0.5,
        animated_background: true,
    },
    Preset {
        name: "pastel",
        keywords: &["pastel", "cute", "cozy", "soft", "kawaii", "whimsical"],
        palette: ["#F8A5C2", "#A0E7E5", "#B4F8C8", "#FFF9F4"],
        dark: false,
        font_hint: "rounded display",
        type_ratio: 1.2,
        heading_weight: 600,
        speed: 0.9,
        easing: "ease-out",
        transition_ms: 300,
        spacing_unit: 12.0,
        corner_radius: 20.0,
        particles: 30,
        shake: 0.1,
        animated_background: false,
    },
    Preset {
        name: "retro",
        keywords: &["retro", "vintage", "pixel", "8-bit", "classic", "arcade-retro"],
        palette: ["#E76F51", "#2A9D8F", "#E9C46A", "#264653"],
        dark: true,
        font_hint: "pixel",
        type_ratio: 1.5,
        heading_weight: 400,
        speed: 1.0,
        easing: "steps",
        transition_ms: 120,
        spacing_unit: 8.0,
        corner_radius: 0.0,
        particles: 30,
        shake: 0.3,
        animated_background: false,
    },
    Preset {
        name: "nature",
        keywords: &["nature", "forest", "garden", "organic", "earthy", "jungle"],
        palette: ["#2E7D32", "#8D6E63", "#FBC02D", "#F1F8E9"],
        dark: false,
        font_hint: "humanist sans",
        type_ratio: 1.25,
        heading_weight: 600,
        speed: 0.9,
        easing: "ease-in-out",
        transition_ms: 350,
        spacing_unit: 10.0,
        corner_radius: 12.0,
        particles: 40,
        shake: 0.1,
        animated_background: true,
    },
    Preset {
        name: "space",
        keywords: &["space", "cosmic", "galaxy", "sci-fi", "stellar", "astral"],
        palette: ["#3D5AFE", "#7C4DFF", "#FFD740", "#05061A"],
        dark: true,
        font_hint: "wide geometric sans",
        type_ratio: 1.333,
        heading_weight: 700,
        speed: 1.1,
        easing: "ease-out",
        transition_ms: 260,
        spacing_unit: 8.0,
        corner_radius: 8.0,
        particles: 80,
        shake: 0.3,
        animated_background: true,
    },
    Preset {
        name: "fire",
        keywords: &["fire", "lava", "volcano", "inferno", "blaze", "heat"],
        palette: ["#D84315", "#FF8F00", "#FFEB3B", "#1C0A00"],
        dark: true,
        font_hint: "heavy slab",
        type_ratio: 1.333,
        heading_weight: 800,
        speed: 1.3,
        easing: "ease-out-expo",
        transition_ms: 200,
        spacing_unit: 8.0,
        corner_radius: 4.0,
        particles: 150,
        shake: 0.8,
        animated_background: true,
    },
    Preset {
        name: "ice",
        keywords: &["ice", "frozen", "winter", "snow", "arctic", "frost"],
        palette: ["#4FC3F7", "#B3E5FC", "#FFFFFF", "#E8F4FA"],
        dark: false,
        font_hint: "light sans",
        type_ratio: 1.2,
        heading_weight: 500,
        speed: 0.85,
        easing: "ease-in-out-sine",
        transition_ms: 380,
        spacing_unit: 10.0,
        corner_radius: 14.0,
        particles: 60,
        shake: 0.1,
        animated_background: true,
    },
];

const ERROR_COLOR: Rgb = Rgb::new(0xD3, 0x2F, 0x2F);

/// Names of every preset in the library
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|p| p.name)
}

fn preset_for_mood(mood: &str) -> &'static Preset {
    let mood = mood.trim().to_lowercase();
    let words: Vec<&str> = mood
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();

    PRESETS
        .iter()
        .find(|p| p.name == mood)
        .or_else(|| {
            words
                .iter()
                .find_map(|w| PRESETS.iter().find(|p| p.keywords.contains(w)))
        })
        .or_else(|| PRESETS.iter().find(|p| p.name == DEFAULT_PRESET))
        .unwrap_or(&PRESETS[0])
}

/// Derive a complete theme. Pure and infallible.
pub fn derive_theme(visual: &VisualDescriptor) -> ThemePayload {
    let preset = preset_for_mood(&visual.mood);
    let pick = |literal: &str, index: usize| {
        Rgb::parse(literal)
            .or_else(|| Rgb::parse(preset.palette[index]))
            .unwrap_or(Rgb::new(0x80, 0x80, 0x80))
    };
    let primary = pick(&visual.palette.primary, 0);
    let secondary = pick(&visual.palette.secondary, 1);
    let accent = pick(&visual.palette.accent, 2);
    let background = pick(&visual.palette.background, 3);

    let (surface, surface_variant) = if preset.dark {
        (background.lighten(0.08), background.lighten(0.14))
    } else {
        (background.darken(0.04), background.darken(0.09))
    };

    let colors = DerivedColors {
        primary: primary.to_hex(),
        primary_light: primary.lighten(0.15).to_hex(),
        primary_dark: primary.darken(0.15).to_hex(),
        on_primary: primary.readable_on().to_hex(),
        secondary: secondary.to_hex(),
        on_secondary: secondary.readable_on().to_hex(),
        accent: accent.to_hex(),
        on_accent: accent.readable_on().to_hex(),
        background: background.to_hex(),
        on_background: background.readable_on().to_hex(),
        surface: surface.to_hex(),
        surface_variant: surface_variant.to_hex(),
        on_surface: surface.readable_on().to_hex(),
        complement: primary.complement().to_hex(),
        error: ERROR_COLOR.to_hex(),
        on_error: ERROR_COLOR.readable_on().to_hex(),
    };

    let body = 16.0_f32;
    let r = preset.type_ratio;
    let typography = TypographyScale {
        font_hint: if visual.font_style.trim().is_empty() {
            preset.font_hint.to_string()
        } else {
            visual.font_style.trim().to_string()
        },
        caption: (body / r).round(),
        body,
        title: (body * r).round(),
        headline: (body * r * r).round(),
        display: (body * r * r * r).round(),
        heading_weight: preset.heading_weight,
        body_weight: 400,
    };

    let unit = preset.spacing_unit;
    let spacing = SpacingScale {
        unit,
        corner_radius: preset.corner_radius,
        elevation: vec![0.0, unit / 4.0, unit / 2.0, unit, unit * 2.0],
    };

    debug!(mood = %visual.mood, preset = preset.name, "Derived theme");

    ThemePayload {
        preset: preset.name.to_string(),
        mood: visual.mood.clone(),
        colors,
        typography,
        motion: MotionProfile {
            speed_multiplier: preset.speed,
            easing: preset.easing.to_string(),
            transition_ms: preset.transition_ms,
        },
        spacing,
        effects: EffectsProfile {
            particle_density: preset.particles,
            screen_shake: preset.shake,
            animated_background: preset.animated_background,
        },
    }
}

/// Theme stage of the content pipeline
#[derive(Debug, Clone, Default)]
pub struct ThemeGenerator;

#[async_trait]
impl ContentGenerator<ThemePayload> for ThemeGenerator {
    fn stage(&self) -> ContentStage {
        ContentStage::Theme
    }

    async fn generate(
        &self,
        spec: &ArtifactSpecification,
        _feedback: Option<&str>,
    ) -> Result<ThemePayload> {
        Ok(derive_theme(&spec.visual))
    }
}
