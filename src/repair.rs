//! Generate-execute-repair loop
//!
//! Drives one code step through bounded attempts. Each attempt regenerates the
//! whole statement set, executes it in order and, on any failure, feeds the
//! attempt's errors into the next generation. Code from fully successful
//! attempts accumulates as forward context, also across steps.

use crate::codegen::{split_statements, CodeGenerator};
use crate::error::CoderError;
use crate::executor::{Executor, StatementOutcome};
use crate::plan::Step;
use crate::retrieval::SearchFilter;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MAX_ATTEMPTS: u32 = 3;

/// What to do when generated code contains no executable statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCodePolicy {
    /// Count it as a vacuously successful attempt
    Resolve,
    /// Count it as a failed attempt and regenerate
    Retry,
}

/// Attempt budget and context limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Failed attempts kept in the error context
    #[serde(default = "default_error_history_attempts")]
    pub error_history_attempts: usize,

    /// Trailing characters of the success context rendered into a prompt (0 = unbounded)
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,

    #[serde(default = "default_empty_code")]
    pub empty_code: EmptyCodePolicy,
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_error_history_attempts() -> usize {
    2
}

fn default_context_char_budget() -> usize {
    12_000
}

fn default_empty_code() -> EmptyCodePolicy {
    EmptyCodePolicy::Resolve
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            error_history_attempts: default_error_history_attempts(),
            context_char_budget: default_context_char_budget(),
            empty_code: default_empty_code(),
        }
    }
}

impl RepairPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.error_history_attempts == 0 {
            return Err("error_history_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Per-step loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Pending,
    Generating,
    Executing,
    Retrying,
    Resolved,
    Exhausted,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Resolved | LoopState::Exhausted)
    }

    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Executing)
                | (Executing, Resolved)
                | (Executing, Retrying)
                | (Executing, Exhausted)
                | (Retrying, Generating)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    pub statement: String,
    pub outcome: StatementOutcome,
}

/// One generate-then-execute cycle.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub attempt_number: u32,
    pub generated_statements: Vec<String>,
    pub results: Vec<StatementResult>,
}

impl Attempt {
    fn new(attempt_number: u32, generated_statements: Vec<String>) -> Self {
        Self {
            attempt_number,
            results: Vec::with_capacity(generated_statements.len()),
            generated_statements,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    /// Error block fed back to the model: every statement with its outcome.
    fn error_summary(&self) -> String {
        if self.generated_statements.is_empty() {
            return format!(
                "Attempt {}: the generated code contained no executable statement.",
                self.attempt_number
            );
        }
        let mut summary = format!("Attempt {}:", self.attempt_number);
        for result in &self.results {
            match &result.outcome {
                StatementOutcome::Success { .. } => {
                    summary.push_str(&format!("\nStatement: {}\nResult: succeeded", result.statement))
                }
                StatementOutcome::Failure { message, .. } => {
                    summary.push_str(&format!("\nStatement: {}\nError: {}", result.statement, message))
                }
            }
        }
        summary
    }
}

/// Summary of a finished attempt kept in the step report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub code: String,
    pub results: Vec<StatementResult>,
    pub succeeded: bool,
}

impl AttemptRecord {
    pub fn errors(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.failure_message())
            .collect()
    }
}

/// Mutable state of one step, owned by the loop until the step terminates.
#[derive(Debug)]
pub struct StepExecutionState {
    pub accumulated_success_context: String,
    pub accumulated_error_context: String,
    pub attempts_used: u32,
    pub resolved: bool,
    state: LoopState,
    recent_failures: VecDeque<String>,
}

impl StepExecutionState {
    fn new(carried_success_context: String) -> Self {
        Self {
            accumulated_success_context: carried_success_context,
            accumulated_error_context: String::new(),
            attempts_used: 0,
            resolved: false,
            state: LoopState::Pending,
            recent_failures: VecDeque::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn transition(&mut self, next: LoopState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal loop transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn record_success(&mut self, statements: &[String]) {
        if !statements.is_empty() {
            if !self.accumulated_success_context.is_empty() {
                self.accumulated_success_context.push('\n');
            }
            self.accumulated_success_context.push_str(&statements.join(";\n"));
            self.accumulated_success_context.push(';');
        }
        self.resolved = true;
    }

    fn record_failure(&mut self, summary: String, keep: usize) {
        self.recent_failures.push_back(summary);
        while self.recent_failures.len() > keep {
            self.recent_failures.pop_front();
        }
        self.accumulated_error_context = self
            .recent_failures
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n");
    }
}

/// Terminal result for one step.
#[derive(Debug, Clone)]
pub struct StepResolution {
    pub state: LoopState,
    pub attempts_used: u32,
    pub attempts: Vec<AttemptRecord>,
    /// Success context to carry into the next step
    pub success_context: String,
}

impl StepResolution {
    pub fn resolved(&self) -> bool {
        self.state == LoopState::Resolved
    }
}

pub struct RepairLoop {
    generator: Arc<CodeGenerator>,
    executor: Arc<Executor>,
    policy: RepairPolicy,
    filter: SearchFilter,
    limit: Option<usize>,
}

impl RepairLoop {
    pub fn new(
        generator: Arc<CodeGenerator>,
        executor: Arc<Executor>,
        policy: RepairPolicy,
        filter: SearchFilter,
        limit: Option<usize>,
    ) -> Self {
        Self {
            generator,
            executor,
            policy,
            filter,
            limit,
        }
    }

    pub fn policy(&self) -> &RepairPolicy {
        &self.policy
    }

    /// Run one code step to `Resolved` or `Exhausted`.
    ///
    /// Statement failures are handled here; retrieval and completion errors
    /// abort the step and propagate.
    pub async fn resolve_step(
        &self,
        step: &Step,
        carried_success_context: String,
    ) -> Result<StepResolution, CoderError> {
        let mut state = StepExecutionState::new(carried_success_context);
        let mut records = Vec::new();
        let task_text = step.task_text();

        while state.attempts_used < self.policy.max_attempts && !state.resolved {
            state.attempts_used += 1;
            let attempt_number = state.attempts_used;
            state.transition(LoopState::Generating);

            let full_context = self.full_context(&task_text, &state);
            let code = self
                .generator
                .generate(&full_context, &self.filter, self.limit)
                .await?;
            let statements = split_statements(&code);
            debug!(
                step = step.name(),
                attempt = attempt_number,
                statements = statements.len(),
                "Attempt generated"
            );

            state.transition(LoopState::Executing);
            let mut attempt = Attempt::new(attempt_number, statements);
            for statement in &attempt.generated_statements {
                let outcome = self.executor.run(statement).await;
                attempt.results.push(StatementResult {
                    statement: statement.clone(),
                    outcome,
                });
            }

            let empty_retry = attempt.generated_statements.is_empty()
                && self.policy.empty_code == EmptyCodePolicy::Retry;
            let succeeded = attempt.all_succeeded() && !empty_retry;

            records.push(AttemptRecord {
                attempt_number,
                code,
                results: attempt.results.clone(),
                succeeded,
            });

            if succeeded {
                state.record_success(&attempt.generated_statements);
                state.transition(LoopState::Resolved);
                info!(
                    step = step.name(),
                    attempt = attempt_number,
                    statements = attempt.generated_statements.len(),
                    "Step resolved"
                );
            } else {
                let failed = attempt
                    .results
                    .iter()
                    .filter(|r| !r.outcome.is_success())
                    .count();
                state.record_failure(attempt.error_summary(), self.policy.error_history_attempts);
                warn!(
                    step = step.name(),
                    attempt = attempt_number,
                    failed_statements = failed,
                    "Attempt failed"
                );
                if state.attempts_used < self.policy.max_attempts {
                    state.transition(LoopState::Retrying);
                } else {
                    state.transition(LoopState::Exhausted);
                    warn!(
                        step = step.name(),
                        attempts = state.attempts_used,
                        "Step exhausted its attempt budget"
                    );
                }
            }
        }

        Ok(StepResolution {
            state: state.state(),
            attempts_used: state.attempts_used,
            attempts: records,
            success_context: state.accumulated_success_context,
        })
    }

    /// Task text followed by the bounded success context and the recent
    /// failures.
    fn full_context(&self, task_text: &str, state: &StepExecutionState) -> String {
        let mut context = task_text.to_string();
        let success = tail_chars(
            &state.accumulated_success_context,
            self.policy.context_char_budget,
        );
        if !success.is_empty() {
            context.push_str("\n\nCode already executed successfully:\n");
            context.push_str(success);
        }
        if !state.accumulated_error_context.is_empty() {
            context.push_str("\n\nErrors from previous attempts:\n");
            context.push_str(&state.accumulated_error_context);
        }
        context
    }
}

/// Last `budget` characters of `text`; the whole text when `budget` is 0.
fn tail_chars(text: &str, budget: usize) -> &str {
    if budget == 0 {
        return text;
    }
    match text.char_indices().rev().nth(budget.saturating_sub(1)) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}
