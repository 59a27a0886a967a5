//! Integration tests for warehouse code generation

mod cli_routing;
mod config_loading;
mod pipeline_scenarios;
mod plan_documents;
mod test_utils;
