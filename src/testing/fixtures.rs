//! Canned specifications, source units and assets

use crate::content::color::Rgb;
use crate::content::{png, AssetBundle, AssetKind, ImageAsset, LogicBundle, SourceFile};
use crate::spec::ArtifactSpecification;

/// The built-in ten-stage specification
pub fn sample_spec() -> ArtifactSpecification {
    ArtifactSpecification::default_spec(10)
}

/// Three units that satisfy the default static check rules
pub fn sample_logic_files() -> Vec<SourceFile> {
    vec![
        SourceFile::new(
            "entities.ts",
            "export class Hopper {\n  x = 0;\n  y = 0;\n  velocity = 0;\n}\n\nexport class Star {\n  collected = false;\n}\n",
        ),
        SourceFile::new(
            "simulation.ts",
            "import { Hopper } from './entities';\n\nexport class World {\n  hopper = new Hopper();\n  score = 0;\n\n  update(dt: number): void {\n    this.hopper.velocity -= 9.8 * dt;\n    this.hopper.y += this.hopper.velocity * dt;\n  }\n}\n",
        ),
        SourceFile::new(
            "integration.ts",
            "import { World } from './simulation';\n\nexport default class SkyHopperGame {\n  world = new World();\n\n  onLoad(): void {\n    this.world.score = 0;\n  }\n\n  tick(dt: number): void {\n    this.world.update(dt);\n  }\n}\n",
        ),
    ]
}

pub fn sample_logic_bundle(cost: f64) -> LogicBundle {
    LogicBundle {
        files: sample_logic_files(),
        cost,
    }
}

/// Generated-looking assets of the right sizes, none of them placeholders
pub fn sample_assets(spec: &ArtifactSpecification, cost: f64) -> AssetBundle {
    let fill = Rgb::parse(&spec.visual.palette.primary).unwrap_or(Rgb::new(0x33, 0x66, 0x99));
    let mark = fill.readable_on();
    AssetBundle {
        assets: AssetKind::ALL
            .iter()
            .map(|&kind| {
                let (width, height) = kind.dimensions();
                ImageAsset {
                    kind,
                    width,
                    height,
                    bytes: png::encode_placeholder(width, height, fill, mark),
                    placeholder: false,
                    prompt: kind.prompt(spec),
                }
            })
            .collect(),
        cost,
    }
}
