//! CLI presentation: text and json formatters per command family.

mod plan;
mod report;
mod research;
mod shared;

pub use plan::{format_plan_text, format_plan_yaml};
pub use report::{format_run_report_json, format_run_report_text};
pub use research::{
    format_documents_json, format_documents_text, format_research_json, format_research_text,
};
pub use shared::{format_config_validation, format_generated_code};
