//! Generation request state machine
//!
//! ```text
//! SpecPending ──► SpecReady ──► ContentPending(1) ──► Validating(1) ──► Accepted(1) ──► Done
//!      │              │               │                    │
//!      │              │               └──────┬─────────────┘
//!      │              │                      ▼
//!      │              │              RetryPending(n) ──► ContentPending(n+1)
//!      │              │                      │
//!      │              └──────────────────────┴──► FallbackPending ──► Done
//!      └──► Done                                  (any non-terminal) ──► Done(failed)
//! ```
//!
//! Attempt numbers must line up: content for attempt `n + 1` can only
//! follow the retry of attempt `n`, and validation or acceptance only
//! refer to the attempt currently in flight. `Done` is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FactoryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationState {
    SpecPending,
    SpecReady,
    ContentPending { attempt: u32 },
    Validating { attempt: u32 },
    RetryPending { attempt: u32 },
    Accepted { attempt: u32 },
    FallbackPending,
    Done { success: bool },
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Done { .. })
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationState::SpecPending => write!(f, "SpecPending"),
            GenerationState::SpecReady => write!(f, "SpecReady"),
            GenerationState::ContentPending { attempt } => write!(f, "ContentPending({})", attempt),
            GenerationState::Validating { attempt } => write!(f, "Validating({})", attempt),
            GenerationState::RetryPending { attempt } => write!(f, "RetryPending({})", attempt),
            GenerationState::Accepted { attempt } => write!(f, "Accepted({})", attempt),
            GenerationState::FallbackPending => write!(f, "FallbackPending"),
            GenerationState::Done { success: true } => write!(f, "Done(success)"),
            GenerationState::Done { success: false } => write!(f, "Done(failed)"),
        }
    }
}

/// Whether `from -> to` is a legal move. Pure.
pub fn is_legal(from: GenerationState, to: GenerationState) -> bool {
    use GenerationState::*;

    match (from, to) {
        (Done { .. }, _) => false,
        // Failure can end the request from anywhere else
        (_, Done { success: false }) => true,
        (Accepted { .. } | FallbackPending, Done { success: true }) => true,

        (SpecPending, SpecReady) => true,
        (SpecReady, ContentPending { attempt }) => attempt == 1,
        // Budget can rule out even the first attempt
        (SpecReady, FallbackPending) => true,

        (ContentPending { attempt: a }, Validating { attempt: b }) => a == b,
        // Content failed before validation could start
        (ContentPending { attempt: a }, RetryPending { attempt: b }) => a == b,

        (Validating { attempt: a }, Accepted { attempt: b }) => a == b,
        (Validating { attempt: a }, RetryPending { attempt: b }) => a == b,

        (RetryPending { attempt: a }, ContentPending { attempt: b }) => b == a + 1,
        (RetryPending { .. }, FallbackPending) => true,

        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: GenerationState,
    pub to: GenerationState,
    pub at: DateTime<Utc>,
}

/// Current state plus the trace of every move made so far
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: GenerationState,
    trace: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: GenerationState::SpecPending,
            trace: Vec::new(),
        }
    }

    pub fn current(&self) -> GenerationState {
        self.current
    }

    pub fn trace(&self) -> &[StateTransition] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<StateTransition> {
        self.trace
    }

    /// Move to `to`, or reject the move and stay put
    pub fn advance(&mut self, to: GenerationState) -> Result<()> {
        if !is_legal(self.current, to) {
            return Err(FactoryError::illegal_transition(
                self.current.to_string(),
                to.to_string(),
            ));
        }
        tracing::debug!(from = %self.current, to = %to, "State transition");
        self.trace.push(StateTransition {
            from: self.current,
            to,
            at: Utc::now(),
        });
        self.current = to;
        Ok(())
    }

    /// End the request as failed unless it already ended
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            let to = GenerationState::Done { success: false };
            self.trace.push(StateTransition {
                from: self.current,
                to,
                at: Utc::now(),
            });
            self.current = to;
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
