//! Retry strategies with configurable backoff
//!
//! Used in two places: collaborator calls retry transient failures through
//! [`RetryExecutor`], and the orchestrator spaces its attempts with
//! [`RetryConfig::delay_for`].

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{FactoryError, FailureKind, Result};

/// Retry configuration with backoff strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Delay before the first retry
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default)]
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: BackoffStrategy::default(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
        }
    }
}

/// Backoff strategies for retry delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear {
        #[serde(with = "humantime_serde")]
        increment: Duration,
    },
    Exponential {
        #[serde(default = "default_exponential_base")]
        base: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: default_exponential_base(),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given 1-based attempt failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base_delay = match &self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear { increment } => {
                self.initial_delay + increment.saturating_mul(attempt - 1)
            }
            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(attempt as i32 - 1);
                let secs = self.initial_delay.as_secs_f64() * multiplier;
                if secs.is_finite() {
                    Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
                } else {
                    self.max_delay
                }
            }
        };

        self.apply_jitter(base_delay.min(self.max_delay))
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }

        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }
}

/// HTTP 5xx statuses worth retrying, as whole numbers only
static SERVER_STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b50[0-4]\b").expect("valid status regex"));

/// Error patterns that mark a collaborator failure as transient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMatcher {
    Network,
    Timeout,
    ServerError,
    RateLimit,
}

impl ErrorMatcher {
    pub const TRANSIENT: [ErrorMatcher; 4] = [
        ErrorMatcher::Network,
        ErrorMatcher::Timeout,
        ErrorMatcher::ServerError,
        ErrorMatcher::RateLimit,
    ];

    /// Check if an error message matches this matcher
    pub fn matches(&self, error_msg: &str) -> bool {
        let error_lower = error_msg.to_lowercase();
        match self {
            ErrorMatcher::Network => {
                error_lower.contains("network")
                    || error_lower.contains("connection")
                    || error_lower.contains("refused")
                    || error_lower.contains("unreachable")
            }
            ErrorMatcher::Timeout => {
                error_lower.contains("timeout") || error_lower.contains("timed out")
            }
            ErrorMatcher::ServerError => {
                SERVER_STATUS_RE.is_match(&error_lower)
                    || error_lower.contains("server error")
                    || error_lower.contains("overloaded")
            }
            ErrorMatcher::RateLimit => {
                error_lower.contains("rate limit")
                    || error_lower.contains("429")
                    || error_lower.contains("too many requests")
            }
        }
    }
}

/// Classify raw collaborator error text. Anything not recognizably
/// transient is permanent, so auth and quota failures are never retried.
pub fn classify_failure(error_msg: &str) -> FailureKind {
    if ErrorMatcher::TRANSIENT.iter().any(|m| m.matches(error_msg)) {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// Retries an operation while it fails with transient errors
pub struct RetryExecutor {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Execute an operation with retry logic
    pub async fn execute_with_retry<F, Fut, T>(&self, operation: F, context: &str) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.cancel.run(operation()).await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", context, attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_transient() || attempt >= self.config.attempts {
                        if err.is_transient() {
                            warn!("{} still failing after {} attempts: {}", context, attempt, err);
                        }
                        return Err(err);
                    }

                    let delay = self.config.delay_for(attempt);
                    info!(
                        "Retrying {} (attempt {}/{}) after {:?}: {}",
                        context, attempt, self.config.attempts, delay, err
                    );

                    self.cancel
                        .run(async {
                            tokio::time::sleep(delay).await;
                            Ok::<_, FactoryError>(())
                        })
                        .await?;
                }
            }
        }
    }
}

// Default functions for serde
fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(8)
}

fn default_jitter_factor() -> f64 {
    0.3
}

fn default_exponential_base() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_error_matcher_rate_limit() {
        let matcher = ErrorMatcher::RateLimit;
        assert!(matcher.matches("Rate limit exceeded"));
        assert!(matcher.matches("Error 429"));
        assert!(matcher.matches("Too many requests"));
        assert!(!matcher.matches("Server error"));
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(classify_failure("connection reset by peer"), FailureKind::Transient);
        assert_eq!(classify_failure("HTTP 503 Service Unavailable"), FailureKind::Transient);
        assert_eq!(classify_failure("request timed out"), FailureKind::Transient);
        assert_eq!(classify_failure("401 invalid api key"), FailureKind::Permanent);
        assert_eq!(classify_failure("quota exhausted"), FailureKind::Permanent);
    }

    #[test]
    fn test_server_status_needs_whole_number() {
        let matcher = ErrorMatcher::ServerError;
        assert!(matcher.matches("upstream returned 502"));
        assert!(matcher.matches("status=504: gateway timeout"));
        assert!(!matcher.matches("quota of 5000 requests exceeded"));
        assert!(!matcher.matches("request id 75031 rejected"));
        assert_eq!(
            classify_failure("quota of 5000 requests exceeded"),
            FailureKind::Permanent
        );
    }

    #[test]
    fn test_backoff_exponential_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(4), Duration::from_secs(8));
        assert_eq!(config.delay_for(10), Duration::from_secs(8));
        assert_eq!(config.delay_for(200), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_linear() {
        let config = RetryConfig {
            backoff: BackoffStrategy::Linear {
                increment: Duration::from_secs(2),
            },
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(100),
            ..Default::default()
        };

        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(3));
        assert_eq!(config.delay_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_application() {
        let config = RetryConfig {
            backoff: BackoffStrategy::Fixed,
            jitter: true,
            jitter_factor: 0.5,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };

        for _ in 0..10 {
            let secs = config.delay_for(1).as_secs_f64();
            assert!((7.5..=12.5).contains(&secs));
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let executor = RetryExecutor::new(fast_config(3), CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute_with_retry(
                || {
                    let calls = calls.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(FactoryError::collaborator(
                                "llm",
                                FailureKind::Transient,
                                "429",
                            ))
                        } else {
                            Ok(42)
                        }
                    }
                },
                "test",
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let executor = RetryExecutor::new(fast_config(5), CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = executor
            .execute_with_retry(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(FactoryError::collaborator(
                            "llm",
                            FailureKind::Permanent,
                            "invalid api key",
                        ))
                    }
                },
                "test",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_attempts_exceeded() {
        let executor = RetryExecutor::new(fast_config(2), CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = executor
            .execute_with_retry(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(FactoryError::collaborator_timeout(
                            "llm",
                            Duration::from_secs(1),
                        ))
                    }
                },
                "test",
            )
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
