//! Artifact specifications: model, generation and novelty scoring

pub mod generator;
pub mod model;
pub mod novelty;
pub mod parse;
pub mod prompt;

pub use generator::{GeneratedSpec, SpecGenerator, SpecSource};
pub use model::{
    ArtifactSpecification, BehaviorRules, Category, DesignHints, Difficulty, Entity, EntityRole,
    InteractionInput, Palette, ParamValue, ScoringRule, SpecSummary, Stage, VisualDescriptor,
};
pub use novelty::{novelty_report, similarity, NoveltyReport, SimilarityBreakdown};
pub use parse::{parse_spec, strip_formatting};
