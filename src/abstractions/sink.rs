//! Output sink for accepted artifacts

use async_trait::async_trait;

use crate::content::{ImageAsset, SourceFile};
use crate::error::Result;

/// Persists an accepted or fallback artifact.
///
/// A failure here is terminal for the generation request.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Write `files` and `assets` under `id`, returning where they landed
    async fn write_artifact(
        &self,
        id: &str,
        files: &[SourceFile],
        assets: &[ImageAsset],
    ) -> Result<String>;

    /// Record the request's provenance next to an artifact already written
    /// to `location`. Sinks without a place for it may ignore the call.
    async fn write_provenance(&self, _location: &str, _provenance_json: &str) -> Result<()> {
        Ok(())
    }
}
