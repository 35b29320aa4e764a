//! Attempt records and the request result handed back to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use super::state::StateTransition;
use crate::content::SourceFile;
use crate::quality::QualityScore;
use crate::spec::NoveltyReport;

/// Serialize a `Duration` as whole milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// One pass of content generation plus validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// 1-based
    pub number: u32,
    pub score: QualityScore,
    /// Logic and asset cost incurred by this attempt
    pub cost: f64,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    /// Passed the strict gates, or the relaxed last-chance bar
    pub success: bool,
    #[serde(default)]
    pub last_chance: bool,
    /// Generator error that replaced validation, if any
    #[serde(default)]
    pub error: Option<String>,
    /// Feedback this attempt was generated with
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub placeholder_assets: usize,
}

/// Why the attempt loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Accepted,
    AttemptsExhausted,
    BudgetExhausted,
    SpecFailed,
    Cancelled,
    TimedOut,
    Infrastructure,
    CollaboratorFailed,
    Persistence,
    /// Per-call configuration was rejected before any work started
    InvalidConfig,
}

/// Everything a caller needs to know about one request.
///
/// Always returned, success or not; `error` carries the human-readable
/// reason when `success` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub request_id: Uuid,
    #[serde(default)]
    pub spec_id: Option<String>,
    pub success: bool,
    pub fallback_used: bool,
    #[serde(default)]
    pub baseline: Option<String>,
    pub stop_reason: StopReason,
    pub attempts: Vec<GenerationAttempt>,
    /// Cost of spec generation, included in `total_cost`
    pub spec_cost: f64,
    pub total_cost: f64,
    pub budget: f64,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Where the sink wrote the artifact
    #[serde(default)]
    pub output_location: Option<String>,
    /// SHA-256 over the delivered source files
    #[serde(default)]
    pub content_digest: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub novelty: Option<NoveltyReport>,
    #[serde(default)]
    pub state_trace: Vec<StateTransition>,
}

impl GenerationResult {
    /// Score of the attempt that was accepted, if any
    pub fn accepted_score(&self) -> Option<&QualityScore> {
        if self.fallback_used {
            return None;
        }
        self.attempts.iter().rev().find(|a| a.success).map(|a| &a.score)
    }

    pub fn best_score(&self) -> Option<&QualityScore> {
        self.attempts
            .iter()
            .map(|a| &a.score)
            .max_by(|a, b| a.overall.total_cmp(&b.overall))
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Stable digest of a file set, independent of file order
pub fn content_digest(files: &[SourceFile]) -> String {
    let mut sorted: Vec<&SourceFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for file in sorted {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.contents.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
