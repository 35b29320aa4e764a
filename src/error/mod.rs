use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::content::ContentStage;

/// Whether a collaborator failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network hiccups, rate limits, timeouts, 5xx responses
    Transient,
    /// Authentication, quota, malformed requests
    Permanent,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// The unified error type for the generation pipeline
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("[E{code:04}] Parse error: {message}")]
    Parse { code: u16, message: String },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
    },

    #[error("[E{code:04}] Generation error in {stage} generator: {message}")]
    Generation {
        code: u16,
        stage: ContentStage,
        message: String,
    },

    #[error("[E{code:04}] Structural check failed: {}", violations.join("; "))]
    Structural {
        code: u16,
        violations: Vec<String>,
        /// Cost already paid for the output that failed the check
        cost: f64,
    },

    #[error("[E{code:04}] Validator infrastructure error: {message}")]
    ValidatorInfrastructure {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Cost budget exceeded: spent {spent:.2} of {budget:.2}")]
    BudgetExceeded { code: u16, spent: f64, budget: f64 },

    #[error("[E{code:04}] Cancelled: {message}")]
    Cancelled { code: u16, message: String },

    #[error("[E{code:04}] {kind} failure from {collaborator}: {message}")]
    Collaborator {
        code: u16,
        collaborator: String,
        kind: FailureKind,
        message: String,
    },

    #[error("[E{code:04}] Persistence error: {message}")]
    Persistence {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Illegal state transition: {from} -> {to}")]
    IllegalTransition { code: u16, from: String, to: String },
}

impl FactoryError {
    /// Create a parse error for malformed collaborator output
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            code: ErrorCode::SPEC_PARSE,
            message: message.into(),
        }
    }

    /// Create a validation error with a specific code and offending field
    pub fn validation(code: u16, message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Create a content generation error for one generator
    pub fn generation(stage: ContentStage, message: impl Into<String>) -> Self {
        Self::Generation {
            code: ErrorCode::CONTENT_GENERATION,
            stage,
            message: message.into(),
        }
    }

    /// Create a structural error from the static check's violations
    pub fn structural(violations: Vec<String>) -> Self {
        Self::Structural {
            code: ErrorCode::CONTENT_STRUCTURAL,
            violations,
            cost: 0.0,
        }
    }

    /// Record the collaborator cost behind a structurally rejected output
    pub fn with_cost(mut self, incurred: f64) -> Self {
        if let Self::Structural { cost, .. } = &mut self {
            *cost = incurred;
        }
        self
    }

    /// Collaborator cost carried by the error, if any
    pub fn incurred_cost(&self) -> f64 {
        match self {
            Self::Structural { cost, .. } => *cost,
            _ => 0.0,
        }
    }

    /// Create a validator infrastructure error
    pub fn validator_infrastructure(message: impl Into<String>) -> Self {
        Self::ValidatorInfrastructure {
            code: ErrorCode::VALIDATOR_INFRASTRUCTURE,
            message: message.into(),
            source: None,
        }
    }

    pub fn budget_exceeded(spent: f64, budget: f64) -> Self {
        Self::BudgetExceeded {
            code: ErrorCode::BUDGET_EXCEEDED,
            spent,
            budget,
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            code: ErrorCode::CANCELLED,
            message: message.into(),
        }
    }

    /// Create an error for the overall request deadline elapsing
    pub fn request_timeout(elapsed: Duration) -> Self {
        Self::Cancelled {
            code: ErrorCode::REQUEST_TIMEOUT,
            message: format!("request deadline of {:?} elapsed", elapsed),
        }
    }

    /// Create a collaborator error with an explicit failure kind
    pub fn collaborator(
        collaborator: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        let code = match kind {
            FailureKind::Transient => ErrorCode::COLLABORATOR_TRANSIENT,
            FailureKind::Permanent => ErrorCode::COLLABORATOR_PERMANENT,
        };
        Self::Collaborator {
            code,
            collaborator: collaborator.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a transient error for a collaborator call that hit its own timeout
    pub fn collaborator_timeout(collaborator: impl Into<String>, limit: Duration) -> Self {
        Self::Collaborator {
            code: ErrorCode::COLLABORATOR_TIMEOUT,
            collaborator: collaborator.into(),
            kind: FailureKind::Transient,
            message: format!("call timed out after {:?}", limit),
        }
    }

    /// Validation that overran its deadline; retried like a hung collaborator
    pub fn validator_timeout(limit: Duration) -> Self {
        Self::Collaborator {
            code: ErrorCode::VALIDATOR_TIMEOUT,
            collaborator: "validator".to_string(),
            kind: FailureKind::Transient,
            message: format!("validation timed out after {:?}", limit),
        }
    }

    pub fn persistence(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Persistence {
            code: ErrorCode::PERSISTENCE_GENERIC,
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    pub fn illegal_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::IllegalTransition {
            code: ErrorCode::ILLEGAL_TRANSITION,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error where the variant supports one
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::ValidatorInfrastructure { source: src, .. }
            | Self::Persistence { source: src, .. }
            | Self::Config { source: src, .. } => {
                *src = Some(source.into());
            }
            _ => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Parse { code, .. }
            | Self::Validation { code, .. }
            | Self::Generation { code, .. }
            | Self::Structural { code, .. }
            | Self::ValidatorInfrastructure { code, .. }
            | Self::BudgetExceeded { code, .. }
            | Self::Cancelled { code, .. }
            | Self::Collaborator { code, .. }
            | Self::Persistence { code, .. }
            | Self::Config { code, .. }
            | Self::IllegalTransition { code, .. } => *code,
        }
    }

    /// Transient collaborator failures may succeed when retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Collaborator {
                kind: FailureKind::Transient,
                ..
            }
        )
    }

    /// Parse and validation failures are retried locally by the spec generator
    pub fn is_malformed_spec(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation { .. })
    }

    /// Errors scoped to one attempt; the orchestrator records them as a
    /// zero-score attempt instead of ending the request
    pub fn is_attempt_local(&self) -> bool {
        matches!(self, Self::Generation { .. } | Self::Structural { .. }) || self.is_transient()
    }

    /// Errors that end the whole generation request
    pub fn is_terminal(&self) -> bool {
        !self.is_attempt_local() && !matches!(self, Self::BudgetExceeded { .. })
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse { message, .. } => {
                format!("The generated specification could not be read: {}", message)
            }
            Self::Validation { message, field, .. } => match field {
                Some(f) => format!("Specification field '{}' is invalid: {}", f, message),
                None => format!("Specification is invalid: {}", message),
            },
            Self::Generation { stage, message, .. } => {
                format!("The {} generator failed: {}", stage, message)
            }
            Self::Structural { violations, .. } => format!(
                "Generated code failed {} structural check(s): {}",
                violations.len(),
                violations.join("; ")
            ),
            Self::ValidatorInfrastructure { message, .. } => {
                format!("Quality validation could not run: {}", message)
            }
            Self::BudgetExceeded { spent, budget, .. } => {
                format!("Spent {:.2} of a {:.2} budget", spent, budget)
            }
            Self::Cancelled { message, .. } => format!("Generation cancelled: {}", message),
            Self::Collaborator {
                collaborator,
                message,
                ..
            } => format!("{} failed: {}", collaborator, message),
            Self::Persistence { message, path, .. } => match path {
                Some(p) => format!("Could not write output at {}: {}", p.display(), message),
                None => format!("Could not write output: {}", message),
            },
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::IllegalTransition { from, to, .. } => {
                format!("Internal error: cannot move from {} to {}", from, to)
            }
        }
    }
}

/// Type alias for Results using FactoryError
pub type Result<T> = std::result::Result<T, FactoryError>;

impl From<std::io::Error> for FactoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence {
            code: ErrorCode::PERSISTENCE_IO,
            message: err.to_string(),
            path: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for FactoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence {
            code: ErrorCode::PERSISTENCE_SERIALIZATION,
            message: err.to_string(),
            path: None,
            source: Some(Box::new(err)),
        }
    }
}
