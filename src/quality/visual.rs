//! Visual checks over the derived theme and the raster assets.

use super::DimensionReport;
use crate::content::color::Rgb;
use crate::content::png;
use crate::content::theme::preset_names;
use crate::content::{AssetBundle, AssetKind, ThemePayload};
use crate::spec::ArtifactSpecification;

const CONTRAST_WEIGHT: f64 = 0.5;
const ASSET_WEIGHT: f64 = 0.3;
const CONSISTENCY_WEIGHT: f64 = 0.2;

/// Contrast, asset loading and theme consistency. Pure; never fails.
#[derive(Debug, Clone, Default)]
pub struct VisualChecker;

impl VisualChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(
        &self,
        spec: &ArtifactSpecification,
        theme: &ThemePayload,
        assets: &AssetBundle,
    ) -> DimensionReport {
        let mut findings = Vec::new();
        let contrast = contrast_rate(theme, &mut findings);
        let loaded = asset_rate(assets, &mut findings);
        let consistency = consistency_rate(spec, theme, &mut findings);

        let score = 100.0
            * (CONTRAST_WEIGHT * contrast + ASSET_WEIGHT * loaded + CONSISTENCY_WEIGHT * consistency);
        DimensionReport::new(score, findings)
    }
}

fn contrast_rate(theme: &ThemePayload, findings: &mut Vec<String>) -> f64 {
    let pairs = theme.contrast_pairs();
    if pairs.is_empty() {
        return 1.0;
    }
    let mut passed = 0;
    for pair in &pairs {
        match (Rgb::parse(&pair.foreground), Rgb::parse(&pair.background)) {
            (Some(fg), Some(bg)) => {
                let ratio = fg.contrast_ratio(bg);
                if ratio >= pair.minimum {
                    passed += 1;
                } else {
                    findings.push(format!(
                        "contrast {} {:.2}:1 below {:.1}:1 ({} on {})",
                        pair.name, ratio, pair.minimum, pair.foreground, pair.background
                    ));
                }
            }
            _ => findings.push(format!("contrast {} has an unparseable color", pair.name)),
        }
    }
    passed as f64 / pairs.len() as f64
}

fn asset_rate(bundle: &AssetBundle, findings: &mut Vec<String>) -> f64 {
    let mut loaded = 0;
    for kind in AssetKind::ALL {
        let Some(asset) = bundle.assets.iter().find(|a| a.kind == kind) else {
            findings.push(format!("{} missing", kind.file_name()));
            continue;
        };
        let expected = kind.dimensions();
        match png::decode_info(&asset.bytes) {
            Ok(info) if (info.width, info.height) == expected => loaded += 1,
            Ok(info) => findings.push(format!(
                "{} is {}x{}, expected {}x{}",
                kind.file_name(),
                info.width,
                info.height,
                expected.0,
                expected.1
            )),
            Err(e) => findings.push(format!("{} does not decode: {}", kind.file_name(), e)),
        }
    }
    loaded as f64 / AssetKind::ALL.len() as f64
}

fn consistency_rate(
    spec: &ArtifactSpecification,
    theme: &ThemePayload,
    findings: &mut Vec<String>,
) -> f64 {
    let colors = &theme.colors;
    let mut checks = 0;
    let mut passed = 0;

    // Palette colors appear verbatim in the derived set
    checks += 1;
    let derived = [
        &colors.primary,
        &colors.secondary,
        &colors.accent,
        &colors.background,
    ];
    let mismatched: Vec<&str> = spec
        .visual
        .palette
        .entries()
        .iter()
        .zip(derived)
        .filter(|((_, literal), derived)| match Rgb::parse(literal) {
            Some(rgb) => !rgb.to_hex().eq_ignore_ascii_case(derived),
            None => true,
        })
        .map(|((name, _), _)| *name)
        .collect();
    if mismatched.is_empty() {
        passed += 1;
    } else {
        findings.push(format!("palette not carried into theme: {}", mismatched.join(", ")));
    }

    checks += 1;
    if preset_names().any(|p| p == theme.preset) {
        passed += 1;
    } else {
        findings.push(format!("unknown theme preset '{}'", theme.preset));
    }

    checks += 1;
    let t = &theme.typography;
    if t.caption < t.body && t.body < t.title && t.title < t.headline && t.headline < t.display {
        passed += 1;
    } else {
        findings.push("typography scale is not ascending".to_string());
    }

    checks += 1;
    let all = [
        &colors.primary_light,
        &colors.primary_dark,
        &colors.on_primary,
        &colors.on_secondary,
        &colors.on_accent,
        &colors.on_background,
        &colors.surface,
        &colors.surface_variant,
        &colors.on_surface,
        &colors.complement,
        &colors.error,
        &colors.on_error,
    ];
    if all.iter().chain(derived.iter()).all(|c| Rgb::parse(c).is_some()) {
        passed += 1;
    } else {
        findings.push("theme contains malformed colors".to_string());
    }

    passed as f64 / checks as f64
}
