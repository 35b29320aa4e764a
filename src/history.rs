//! JSON-file store of prior spec summaries
//!
//! The orchestrator never reads or writes history on its own. Callers load
//! it, pass a slice of [`SpecHistory::recent`] into each request and append
//! the accepted spec afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ErrorCode, FactoryError, Result};
use crate::spec::SpecSummary;

const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub summary: SpecSummary,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

pub struct SpecHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl SpecHistory {
    /// Load from `path`; a missing file is an empty history
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No history at {}, starting empty", path.display());
            return Ok(Self {
                path,
                entries: Vec::new(),
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| with_path(e.into(), &path))?;
        let file: HistoryFile = serde_json::from_str(&content).map_err(|e| {
            FactoryError::Persistence {
                code: ErrorCode::PERSISTENCE_SERIALIZATION,
                message: format!("history file is corrupt: {}", e),
                path: Some(path.clone()),
                source: Some(Box::new(e)),
            }
        })?;
        if file.version > HISTORY_VERSION {
            return Err(FactoryError::persistence(
                format!(
                    "history version {} is newer than supported version {}",
                    file.version, HISTORY_VERSION
                ),
                Some(path),
            ));
        }
        debug!("Loaded {} history entries from {}", file.entries.len(), path.display());
        Ok(Self {
            path,
            entries: file.entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Record a spec. An entry with the same id is replaced and moves to
    /// the end.
    pub fn append(&mut self, summary: SpecSummary) {
        self.entries.retain(|e| e.summary.id != summary.id);
        self.entries.push(HistoryEntry {
            summary,
            recorded_at: Utc::now(),
        });
    }

    /// The `n` most recent summaries, oldest first
    pub fn recent(&self, n: usize) -> Vec<SpecSummary> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..]
            .iter()
            .map(|e| e.summary.clone())
            .collect()
    }

    /// Write atomically through a temp file in the same directory
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| with_path(e.into(), parent))?;
        }
        let file = HistoryFile {
            version: HISTORY_VERSION,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json).map_err(|e| with_path(e.into(), &temp))?;
        fs::rename(&temp, &self.path).map_err(|e| with_path(e.into(), &self.path))?;
        debug!("Saved {} history entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

fn with_path(err: FactoryError, at: &Path) -> FactoryError {
    match err {
        FactoryError::Persistence {
            code,
            message,
            source,
            ..
        } => FactoryError::Persistence {
            code,
            message,
            path: Some(at.to_path_buf()),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ArtifactSpecification;
    use tempfile::TempDir;

    fn summary(id: &str) -> SpecSummary {
        let mut spec = ArtifactSpecification::default_spec(10);
        spec.id = id.to_string();
        spec.summary()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = SpecHistory::load(dir.path().join("history.json")).unwrap();
        assert!(history.is_empty());
        assert!(history.recent(5).is_empty());
    }

    #[test]
    fn test_append_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let mut history = SpecHistory::load(&path).unwrap();
        history.append(summary("a"));
        history.append(summary("b"));
        history.append(summary("c"));
        history.save().unwrap();

        let reloaded = SpecHistory::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
        let ids: Vec<String> = reloaded.recent(2).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(!dir.path().join("nested").join("history.json.tmp").exists());
    }

    #[test]
    fn test_same_id_replaces_and_moves_last() {
        let dir = TempDir::new().unwrap();
        let mut history = SpecHistory::load(dir.path().join("h.json")).unwrap();
        history.append(summary("a"));
        history.append(summary("b"));
        history.append(summary("a"));

        let ids: Vec<String> = history.recent(10).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_corrupt_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let err = SpecHistory::load(&path).err().unwrap();
        assert_eq!(err.code(), ErrorCode::PERSISTENCE_SERIALIZATION);
        match err {
            FactoryError::Persistence { path: Some(p), .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
