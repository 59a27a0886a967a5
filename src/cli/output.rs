//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::CoderError;

/// Map domain errors to a one-line category prefix plus the message.
pub fn map_error(e: &CoderError) -> String {
    let category = match e {
        CoderError::ConfigError(_) => "config",
        CoderError::Session(_) => "session",
        CoderError::Retrieval(_) => "retrieval",
        CoderError::Completion(_)
        | CoderError::CompletionAuthFailed(_)
        | CoderError::CompletionRateLimit(_) => "completion",
        CoderError::PlanParse(_) => "plan",
        CoderError::StatementExecution(_) => "statement",
        CoderError::StepExhausted { .. } => "run",
        CoderError::Timeout { .. } => "timeout",
        CoderError::Io(_) => "io",
    };
    if e.is_transient() {
        format!("error[{}]: {} (transient, try again later)", category, e)
    } else {
        format!("error[{}]: {}", category, e)
    }
}
