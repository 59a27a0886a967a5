//! Run report presentation: summary table plus the attempt trace of every
//! code step.

use super::shared::to_pretty_json;
use crate::error::CoderError;
use crate::orchestrator::{RunOutcome, RunReport, StepDisposition};
use comfy_table::Table;
use owo_colors::OwoColorize;

fn disposition_label(disposition: StepDisposition) -> String {
    match disposition {
        StepDisposition::NotExecuted => "not executed".dimmed().to_string(),
        StepDisposition::Resolved => "resolved".green().to_string(),
        StepDisposition::Exhausted => "exhausted".red().to_string(),
    }
}

pub fn format_run_report_text(report: &RunReport) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Step", "Kind", "Result", "Attempts"]);
    for step in &report.steps {
        table.add_row(vec![
            step.index.to_string(),
            step.name.clone(),
            step.kind.to_string(),
            disposition_label(step.disposition),
            step.attempts_used.to_string(),
        ]);
    }

    let mut output = format!("Run {}\n{}\n", report.run_id.bold(), table);

    for step in &report.steps {
        if step.attempts.is_empty() {
            continue;
        }
        output.push_str(&format!(
            "\n{}\n",
            format!("Step {}: {}", step.index, step.name).bold().underline()
        ));
        for attempt in &step.attempts {
            let status = if attempt.succeeded {
                "succeeded".green().to_string()
            } else {
                "failed".red().to_string()
            };
            output.push_str(&format!("  Attempt {} {}\n", attempt.attempt_number, status));
            if attempt.results.is_empty() {
                output.push_str("    (no executable statements)\n");
            }
            for result in &attempt.results {
                let marker = if result.outcome.is_success() { "ok" } else { "error" };
                output.push_str(&format!(
                    "    [{}] {}\n      {}\n",
                    marker,
                    single_line(&result.statement),
                    result.outcome
                ));
            }
        }
    }

    let summary = format!(
        "\n{} resolved, {} exhausted, {} not executed",
        report.resolved_count(),
        report.exhausted_count(),
        report.not_executed_count()
    );
    output.push_str(&summary);
    match report.outcome {
        RunOutcome::Complete => output.push_str(&format!(" ({})", "complete".green())),
        RunOutcome::Partial => output.push_str(&format!(" ({})", "partial".yellow())),
    }
    output
}

pub fn format_run_report_json(report: &RunReport) -> Result<String, CoderError> {
    to_pretty_json(report)
}

fn single_line(statement: &str) -> String {
    const MAX: usize = 120;
    let flat = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > MAX {
        format!("{}...", flat.chars().take(MAX).collect::<String>())
    } else {
        flat
    }
}
