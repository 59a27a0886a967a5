//! Single-statement execution against the warehouse.

use crate::error::{CoderError, WarehouseError};
use crate::warehouse::{Binding, ResultRow, ResultSet, WarehouseSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Statement execution capability: runs arbitrary DDL/DML text.
#[async_trait]
pub trait StatementCapability: Send + Sync {
    async fn execute(&self, statement: &str, bindings: &[Binding])
        -> Result<ResultSet, CoderError>;
}

#[async_trait]
impl StatementCapability for WarehouseSession {
    async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
    ) -> Result<ResultSet, CoderError> {
        self.submit_statement(statement, bindings)
            .await
            .map_err(|e| match e {
                WarehouseError::Timeout(_) => CoderError::Timeout {
                    operation: "statement",
                    after: self.statement_timeout(),
                },
                WarehouseError::Unauthorized(msg) => CoderError::Session(msg),
                WarehouseError::Rejected { message, .. } => CoderError::StatementExecution(message),
                other => CoderError::StatementExecution(other.to_string()),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Execution,
    Timeout,
}

/// Result of running one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatementOutcome {
    /// First result row, when the statement returned any
    Success { row: Option<ResultRow> },
    Failure { message: String, kind: FailureKind },
}

impl StatementOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StatementOutcome::Success { .. })
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            StatementOutcome::Failure { message, .. } => Some(message),
            StatementOutcome::Success { .. } => None,
        }
    }
}

impl fmt::Display for StatementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementOutcome::Success { row: Some(row) } => write!(f, "{}", row),
            StatementOutcome::Success { row: None } => f.write_str("OK"),
            StatementOutcome::Failure { message, .. } => f.write_str(message),
        }
    }
}

/// Runs statements one at a time and converts every failure into a
/// [`StatementOutcome::Failure`].
pub struct Executor {
    statements: Arc<dyn StatementCapability>,
    timeout: Duration,
}

impl Executor {
    pub fn new(statements: Arc<dyn StatementCapability>, timeout: Duration) -> Self {
        Self {
            statements,
            timeout,
        }
    }

    pub async fn run(&self, statement: &str) -> StatementOutcome {
        let result =
            tokio::time::timeout(self.timeout, self.statements.execute(statement, &[])).await;
        let outcome = match result {
            Ok(Ok(set)) => StatementOutcome::Success {
                row: set.first_row(),
            },
            Ok(Err(CoderError::Timeout { after, .. })) => timed_out(after),
            Err(_) => timed_out(self.timeout),
            Ok(Err(CoderError::StatementExecution(message))) => StatementOutcome::Failure {
                message: format!("Error executing statement: {}", message),
                kind: FailureKind::Execution,
            },
            Ok(Err(e)) => StatementOutcome::Failure {
                message: format!("Error executing statement: {}", e),
                kind: FailureKind::Execution,
            },
        };
        debug!(
            statement_chars = statement.len(),
            success = outcome.is_success(),
            "Statement executed"
        );
        outcome
    }
}

fn timed_out(after: Duration) -> StatementOutcome {
    StatementOutcome::Failure {
        message: format!(
            "Error executing statement: timed out after {}s",
            after.as_secs()
        ),
        kind: FailureKind::Timeout,
    }
}
