//! Plan presentation.

use crate::error::CoderError;
use crate::plan::{Plan, StepKind};
use comfy_table::Table;

pub fn format_plan_text(plan: &Plan) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Step", "Kind", "Object", "Objective"]);
    for (i, step) in plan.steps().iter().enumerate() {
        let object = format!(
            "{} ({})",
            step.target_object().name,
            step.target_object().object_type
        );
        table.add_row(vec![
            (i + 1).to_string(),
            step.name().to_string(),
            step.kind().to_string(),
            object,
            step.objective().to_string(),
        ]);
    }
    let documentation = plan
        .steps()
        .iter()
        .filter(|s| s.kind() == StepKind::Documentation)
        .count();
    format!(
        "{}\n{} steps: {} code, {} documentation",
        table,
        plan.len(),
        plan.code_step_count(),
        documentation
    )
}

pub fn format_plan_yaml(plan: &Plan) -> Result<String, CoderError> {
    plan.to_yaml()
}
