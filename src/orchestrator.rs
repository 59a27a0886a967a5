//! Plan orchestration: runs every step in order and reports per-step results.

use crate::error::CoderError;
use crate::plan::{Plan, StepKind};
use crate::repair::{AttemptRecord, RepairLoop};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDisposition {
    /// Documentation step, reported but never executed
    NotExecuted,
    Resolved,
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// 1-based position in the plan
    pub index: usize,
    pub name: String,
    pub kind: StepKind,
    pub disposition: StepDisposition,
    pub attempts_used: u32,
    pub attempts: Vec<AttemptRecord>,
    pub description: String,
}

impl StepReport {
    pub fn resolved(&self) -> bool {
        self.disposition == StepDisposition::Resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every code step resolved
    Complete,
    /// At least one code step exhausted its budget
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub steps: Vec<StepReport>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn resolved_count(&self) -> usize {
        self.count(StepDisposition::Resolved)
    }

    pub fn exhausted_count(&self) -> usize {
        self.count(StepDisposition::Exhausted)
    }

    pub fn not_executed_count(&self) -> usize {
        self.count(StepDisposition::NotExecuted)
    }

    fn count(&self, disposition: StepDisposition) -> usize {
        self.steps
            .iter()
            .filter(|s| s.disposition == disposition)
            .count()
    }

    /// Turn a partial run into an error naming the first exhausted step.
    pub fn ensure_complete(&self) -> Result<(), CoderError> {
        match self
            .steps
            .iter()
            .find(|s| s.disposition == StepDisposition::Exhausted)
        {
            Some(step) => Err(CoderError::StepExhausted {
                step: step.name.clone(),
                attempts: step.attempts_used,
            }),
            None => Ok(()),
        }
    }
}

pub struct Orchestrator {
    repair: Arc<RepairLoop>,
}

impl Orchestrator {
    pub fn new(repair: Arc<RepairLoop>) -> Self {
        Self { repair }
    }

    /// Best-effort run: an exhausted step is reported and the next step still
    /// runs. Any other error aborts the run.
    pub async fn run(&self, plan: &Plan) -> Result<RunReport, CoderError> {
        let run_id = new_run_id(plan);
        info!(
            run_id = %run_id,
            steps = plan.len(),
            code_steps = plan.code_step_count(),
            "Plan run started"
        );

        let mut success_context = String::new();
        let mut reports = Vec::with_capacity(plan.len());

        for (position, step) in plan.steps().iter().enumerate() {
            let index = position + 1;
            if step.kind() == StepKind::Documentation {
                info!(run_id = %run_id, step = index, name = step.name(), "Documentation step recorded");
                reports.push(StepReport {
                    index,
                    name: step.name().to_string(),
                    kind: step.kind(),
                    disposition: StepDisposition::NotExecuted,
                    attempts_used: 0,
                    attempts: Vec::new(),
                    description: step.description().to_string(),
                });
                continue;
            }

            info!(run_id = %run_id, step = index, name = step.name(), "Code step started");
            let resolution = self
                .repair
                .resolve_step(step, std::mem::take(&mut success_context))
                .await?;
            let resolved = resolution.resolved();
            success_context = resolution.success_context;

            let disposition = if resolved {
                StepDisposition::Resolved
            } else {
                warn!(run_id = %run_id, step = index, name = step.name(), "Code step exhausted, continuing");
                StepDisposition::Exhausted
            };
            reports.push(StepReport {
                index,
                name: step.name().to_string(),
                kind: step.kind(),
                disposition,
                attempts_used: resolution.attempts_used,
                attempts: resolution.attempts,
                description: step.description().to_string(),
            });
        }

        let outcome = if reports
            .iter()
            .any(|r| r.disposition == StepDisposition::Exhausted)
        {
            RunOutcome::Partial
        } else {
            RunOutcome::Complete
        };
        let report = RunReport {
            run_id,
            steps: reports,
            outcome,
        };
        info!(
            run_id = %report.run_id,
            resolved = report.resolved_count(),
            exhausted = report.exhausted_count(),
            not_executed = report.not_executed_count(),
            outcome = ?report.outcome,
            "Plan run finished"
        );
        Ok(report)
    }
}

fn new_run_id(plan: &Plan) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let mut hasher = blake3::Hasher::new();
    hasher.update(now.to_string().as_bytes());
    for step in plan.steps() {
        hasher.update(step.name().as_bytes());
        hasher.update(b"\0");
    }
    format!("run-{}-{}", now, &hex::encode(hasher.finalize().as_bytes())[..8])
}
