//! Bounded-parallel runner for independent generation requests

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::cancel::CancellationToken;
use crate::config::GenerationConfig;
use crate::error::{FactoryError, Result};
use crate::orchestrator::{GenerationOrchestrator, GenerationRequest, GenerationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Accepted from a generated attempt
    pub successes: usize,
    /// Delivered from a baseline
    pub fallbacks: usize,
    pub failures: usize,
    pub total_cost: f64,
}

impl BatchSummary {
    pub fn from_results(results: &[GenerationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match (result.success, result.fallback_used) {
                (true, false) => summary.successes += 1,
                (true, true) => summary.fallbacks += 1,
                (false, _) => summary.failures += 1,
            }
            summary.total_cost += result.total_cost;
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One result per request, in request order
    pub results: Vec<GenerationResult>,
    pub summary: BatchSummary,
}

pub struct BatchRunner {
    orchestrator: Arc<GenerationOrchestrator>,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(FactoryError::config("batch concurrency must be at least 1"));
        }
        Ok(Self {
            orchestrator,
            max_concurrent,
        })
    }

    /// Run every request with at most `max_concurrent` in flight.
    ///
    /// Requests share nothing but the orchestrator's collaborators and the
    /// cancellation token; one failing never affects another.
    pub async fn run(
        &self,
        requests: Vec<GenerationRequest>,
        config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> BatchReport {
        let total = requests.len();
        info!(total, max_concurrent = self.max_concurrent, "Starting batch");

        let mut indexed: Vec<(usize, GenerationResult)> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| {
                let orchestrator = self.orchestrator.clone();
                let cancel = cancel.clone();
                async move { (index, orchestrator.generate(request, config, cancel).await) }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let results: Vec<GenerationResult> = indexed.into_iter().map(|(_, r)| r).collect();
        let summary = BatchSummary::from_results(&results);
        info!(
            successes = summary.successes,
            fallbacks = summary.fallbacks,
            failures = summary.failures,
            total_cost = summary.total_cost,
            "Batch complete"
        );
        BatchReport { results, summary }
    }
}
