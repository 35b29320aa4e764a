//! Filesystem artifact sink
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<id>/
//!     entities.ts, simulation.ts, integration.ts, theme.json, spec.json
//!     assets/title.png, assets/menu.png, assets/gameplay.png
//!     provenance.json
//! ```

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::abstractions::ArtifactSink;
use crate::content::{ImageAsset, SourceFile};
use crate::error::{FactoryError, Result};

pub const ASSETS_DIR: &str = "assets";
pub const PROVENANCE_FILE: &str = "provenance.json";

#[derive(Debug, Clone)]
pub struct FileSystemSink {
    root: PathBuf,
}

impl FileSystemSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path that stays inside the artifact directory
    fn checked_relative(path: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if safe {
            Ok(relative)
        } else {
            Err(FactoryError::persistence(
                format!("refusing to write outside the artifact directory: '{}'", path),
                None,
            ))
        }
    }

    async fn write_into(
        dir: &Path,
        files: &[SourceFile],
        assets: &[ImageAsset],
    ) -> Result<()> {
        fs::create_dir_all(dir.join(ASSETS_DIR)).await.map_err(io_at(dir))?;
        for file in files {
            let target = dir.join(Self::checked_relative(&file.path)?);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await.map_err(io_at(parent))?;
            }
            fs::write(&target, file.contents.as_bytes())
                .await
                .map_err(io_at(&target))?;
        }
        for asset in assets {
            let target = dir.join(ASSETS_DIR).join(asset.file_name());
            fs::write(&target, &asset.bytes).await.map_err(io_at(&target))?;
        }
        Ok(())
    }

    /// Swap the staged directory in for any previous artifact
    async fn promote(staging: &Path, target: &Path) -> Result<()> {
        if fs::metadata(target).await.is_ok() {
            debug!("Replacing existing artifact at {}", target.display());
            fs::remove_dir_all(target).await.map_err(io_at(target))?;
        }
        fs::rename(staging, target).await.map_err(io_at(target))
    }
}

fn io_at(path: &Path) -> impl Fn(std::io::Error) -> FactoryError + '_ {
    move |e| FactoryError::persistence(e.to_string(), Some(path.to_path_buf())).with_source(e)
}

#[async_trait]
impl ArtifactSink for FileSystemSink {
    /// Files land in a staging directory first and are renamed into place,
    /// so a failed write never leaves a half-written artifact behind.
    async fn write_artifact(
        &self,
        id: &str,
        files: &[SourceFile],
        assets: &[ImageAsset],
    ) -> Result<String> {
        let relative = Self::checked_relative(id)?;
        if relative.components().count() != 1 {
            return Err(FactoryError::persistence(
                format!("artifact id '{}' is not a single path segment", id),
                None,
            ));
        }

        fs::create_dir_all(&self.root).await.map_err(io_at(&self.root))?;
        let staging = self.root.join(format!(".{}.{}.partial", id, Uuid::new_v4()));
        let target = self.root.join(relative);

        let written = match Self::write_into(&staging, files, assets).await {
            Ok(()) => Self::promote(&staging, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        info!(
            files = files.len(),
            assets = assets.len(),
            "Wrote artifact to {}",
            target.display()
        );
        Ok(target.display().to_string())
    }

    async fn write_provenance(&self, location: &str, provenance_json: &str) -> Result<()> {
        let target = Path::new(location).join(PROVENANCE_FILE);
        fs::write(&target, provenance_json.as_bytes())
            .await
            .map_err(io_at(&target))
    }
}
