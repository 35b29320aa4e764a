//! Abstraction layers for external collaborators
//!
//! Every external service the pipeline talks to sits behind one of these
//! traits so the orchestrator can be driven entirely by stubs in tests.
//! Implementations for real services live in embedding applications.

pub mod image;
pub mod llm;
pub mod sink;
pub mod tooling;

pub use image::{GeneratedImage, ImageGenerator};
pub use llm::{Completion, LlmClient};
pub use sink::ArtifactSink;
pub use tooling::{
    BuildTooling, SimulationReport, SimulationSandbox, SyntheticInput, TestReport, ToolReport,
};
