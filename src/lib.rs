//! # Gamefactory
//!
//! Budget-bounded, quality-gated generation of small game artifacts.
//!
//! A request produces a validated specification, then loops over content
//! generation and quality validation until an attempt is accepted or the
//! attempt or cost budget runs out, in which case a known-good baseline is
//! delivered instead.
//!
//! ## Modules
//!
//! - `abstractions` - Collaborator traits (LLM, images, build tooling, sandbox, sink)
//! - `batch` - Bounded-parallel runner for many independent requests
//! - `cancel` - Cooperative cancellation token
//! - `config` - Layered configuration with env overrides and validation
//! - `content` - Logic, theme and asset generators plus color and PNG helpers
//! - `error` - `FactoryError` taxonomy with stable numeric codes
//! - `fallback` - Baseline catalog and selector
//! - `history` - JSON store of prior spec summaries
//! - `orchestrator` - State machine, cost ledger and the attempt loop
//! - `prompt` - Tera prompt templates
//! - `quality` - Structural, behavioral and visual scoring
//! - `retry` - Backoff and transient-failure retry
//! - `sink` - Filesystem artifact sink
//! - `spec` - Specification model, parsing, generation and novelty
//! - `testing` - Stub collaborators for tests
pub mod abstractions;
pub mod batch;
pub mod cancel;
pub mod config;
pub mod content;
pub mod error;
pub mod fallback;
pub mod history;
pub mod orchestrator;
pub mod prompt;
pub mod quality;
pub mod retry;
pub mod sink;
pub mod spec;

pub mod testing;

pub use cancel::CancellationToken;
pub use error::{FactoryError, Result};
pub use orchestrator::{GenerationOrchestrator, GenerationRequest, GenerationResult};
