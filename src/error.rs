//! Error types for the warehouse code-generation pipeline.

use std::time::Duration;
use thiserror::Error;

/// Failures reported by the warehouse REST surface (statements and search).
///
/// Capabilities map these into the [`CoderError`] kind that fits their caller:
/// a rejected statement is a `StatementExecution` error for the executor but a
/// `Completion` error when the statement was a completion call.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Statement rejected ({code}): {message}")]
    Rejected {
        code: String,
        sql_state: Option<String>,
        message: String,
    },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum CoderError {
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Completion authentication failed: {0}")]
    CompletionAuthFailed(String),

    #[error("Completion rate limit exceeded: {0}")]
    CompletionRateLimit(String),

    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("Statement execution failed: {0}")]
    StatementExecution(String),

    #[error("Step '{step}' exhausted its retry budget after {attempts} attempts")]
    StepExhausted { step: String, attempts: u32 },

    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Warehouse session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoderError {
    /// Map a warehouse failure raised during a completion call.
    pub fn from_completion_failure(err: WarehouseError, after: Duration) -> Self {
        match err {
            WarehouseError::Unauthorized(msg) => CoderError::CompletionAuthFailed(msg),
            WarehouseError::RateLimited(msg) => CoderError::CompletionRateLimit(msg),
            WarehouseError::Timeout(_) => CoderError::Timeout {
                operation: "completion",
                after,
            },
            other => CoderError::Completion(other.to_string()),
        }
    }

    /// True for the error kinds the caller may reasonably retry later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoderError::CompletionRateLimit(_) | CoderError::Timeout { .. }
        )
    }
}

impl From<config::ConfigError> for CoderError {
    fn from(err: config::ConfigError) -> Self {
        CoderError::ConfigError(err.to_string())
    }
}
