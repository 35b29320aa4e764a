//! Stub collaborators, one module per seam

pub mod content;
pub mod gate;
pub mod image;
pub mod llm;
pub mod sink;
pub mod spec;
pub mod tooling;

pub use content::{StubAssets, StubLogic};
pub use gate::ScriptedGate;
pub use image::{FailingImageGenerator, SolidImageGenerator};
pub use llm::ScriptedLlm;
pub use sink::{MemorySink, StoredArtifact};
pub use spec::FixedSpecSource;
pub use tooling::{StubSandbox, StubTooling};
