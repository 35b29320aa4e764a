//! In-memory artifact sink

use async_trait::async_trait;
use std::sync::Mutex;

use crate::abstractions::ArtifactSink;
use crate::content::{ImageAsset, SourceFile};
use crate::error::{FactoryError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub id: String,
    pub files: Vec<SourceFile>,
    pub asset_names: Vec<String>,
}

/// Keeps written artifacts and provenance records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<StoredArtifact>>,
    provenance: Mutex<Vec<(String, String)>>,
    fail_writes: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every artifact write fails with a persistence error
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn artifacts(&self) -> Vec<StoredArtifact> {
        self.artifacts.lock().unwrap().clone()
    }

    /// `(location, json)` pairs in write order
    pub fn provenance(&self) -> Vec<(String, String)> {
        self.provenance.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write_artifact(
        &self,
        id: &str,
        files: &[SourceFile],
        assets: &[ImageAsset],
    ) -> Result<String> {
        if self.fail_writes {
            return Err(FactoryError::persistence("disk full", None));
        }
        self.artifacts.lock().unwrap().push(StoredArtifact {
            id: id.to_string(),
            files: files.to_vec(),
            asset_names: assets.iter().map(|a| a.file_name().to_string()).collect(),
        });
        Ok(format!("memory://{}", id))
    }

    async fn write_provenance(&self, location: &str, provenance_json: &str) -> Result<()> {
        self.provenance
            .lock()
            .unwrap()
            .push((location.to_string(), provenance_json.to_string()));
        Ok(())
    }
}
