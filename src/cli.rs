//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to the pipeline.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{
    format_config_validation, format_documents_json, format_documents_text,
    format_generated_code, format_plan_text, format_plan_yaml, format_research_json,
    format_research_text, format_run_report_json, format_run_report_text,
};
pub use route::{CommandOutput, Connector, RunContext, EXIT_PARTIAL_RUN};
