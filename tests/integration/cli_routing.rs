//! CLI route table over fake capabilities.

use super::test_utils::{test_config, FakeWarehouse, Fakes, ORDERS_PLAN};
use clap::Parser;
use std::sync::Arc;
use tempfile::TempDir;
use warehouse_coder::cli::{Cli, RunContext, EXIT_PARTIAL_RUN};
use warehouse_coder::config::CoderConfig;
use warehouse_coder::pipeline::PipelineRun;

fn context_for(workspace: &TempDir, fakes: &Fakes) -> RunContext {
    let search = Arc::clone(&fakes.search);
    let completion = Arc::clone(&fakes.completion);
    let warehouse = Arc::clone(&fakes.warehouse);
    RunContext::with_connector(
        workspace.path().to_path_buf(),
        test_config(),
        Box::new(move |config: &CoderConfig| {
            PipelineRun::with_capabilities(
                config.clone(),
                search.clone(),
                completion.clone(),
                warehouse.clone(),
            )
        }),
    )
}

#[tokio::test]
async fn strict_run_of_saved_plan_exits_with_partial_code() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("plan.yaml"), ORDERS_PLAN).unwrap();
    let fakes = Fakes::new(
        &[
            "CREATE TABLE ORDERS (ID INT);",
            "SELECT NOPE;",
            "SELECT NOPE;",
            "SELECT NOPE;",
        ],
        FakeWarehouse::new().failing_on("NOPE", "invalid identifier 'NOPE'"),
    );
    let cli = Cli::try_parse_from([
        "whcoder",
        "run",
        "--plan-file",
        "plan.yaml",
        "--yes",
        "--strict",
        "--format",
        "json",
    ])
    .unwrap();

    let output = context_for(&workspace, &fakes)
        .execute(&cli.command)
        .await
        .unwrap();

    assert_eq!(output.exit_code, EXIT_PARTIAL_RUN);
    assert!(output.text.contains("\"outcome\": \"partial\""));
    assert!(output.text.contains("Create amount view"));
    assert_eq!(fakes.warehouse.statements().len(), 4);
}

#[tokio::test]
async fn non_strict_partial_run_exits_zero() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("plan.yaml"), ORDERS_PLAN).unwrap();
    let fakes = Fakes::new(
        &["SELECT NOPE;", "SELECT NOPE;", "SELECT NOPE;", "SELECT 1;"],
        FakeWarehouse::new().failing_on("NOPE", "invalid identifier 'NOPE'"),
    );
    let cli = Cli::try_parse_from(["whcoder", "run", "--plan-file", "plan.yaml", "--yes"]).unwrap();

    let output = context_for(&workspace, &fakes)
        .execute(&cli.command)
        .await
        .unwrap();
    assert_eq!(output.exit_code, 0);
    assert!(output.text.contains("1 resolved, 1 exhausted, 1 not executed"));
}

#[tokio::test]
async fn plan_command_reads_idea_file_and_prints_yaml() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("idea.txt"), "track order amounts").unwrap();
    let fakes = Fakes::new(&[ORDERS_PLAN], FakeWarehouse::new());
    let cli = Cli::try_parse_from([
        "whcoder",
        "plan",
        "--idea-file",
        "idea.txt",
        "--format",
        "yaml",
    ])
    .unwrap();

    let output = context_for(&workspace, &fakes)
        .execute(&cli.command)
        .await
        .unwrap();
    assert!(output.text.contains("step_name: Create orders table"));
    assert!(fakes.completion.prompts()[0].contains("track order amounts"));
    assert!(fakes.warehouse.statements().is_empty());
}
