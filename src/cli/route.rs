//! CLI route: single route table and run context. Dispatches to the pipeline and presentation.

use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_validation, format_documents_json, format_documents_text,
    format_generated_code, format_plan_text, format_plan_yaml, format_research_json,
    format_research_text, format_run_report_json, format_run_report_text,
};
use crate::cli::{command_name, map_error};
use crate::config::{CoderConfig, ConfigLoader};
use crate::error::CoderError;
use crate::orchestrator::RunOutcome;
use crate::pipeline::PipelineRun;
use crate::plan::Plan;
use crate::retrieval::SearchFilter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Exit code for a `--strict` run that left a code step exhausted.
pub const EXIT_PARTIAL_RUN: i32 = 2;

/// Opens the pipeline a command runs on.
pub type Connector = Box<dyn Fn(&CoderConfig) -> Result<PipelineRun, CoderError> + Send + Sync>;

/// Text to print plus the process exit code.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

/// Runtime context for CLI execution: workspace, effective config and the
/// pipeline connector.
pub struct RunContext {
    workspace_root: PathBuf,
    config: CoderConfig,
    connector: Connector,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CoderError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::with_connector(
            workspace_root,
            config,
            Box::new(|config: &CoderConfig| PipelineRun::connect(config.clone())),
        ))
    }

    pub fn with_connector(workspace_root: PathBuf, config: CoderConfig, connector: Connector) -> Self {
        Self {
            workspace_root,
            config,
            connector,
        }
    }

    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<CommandOutput, CoderError> {
        let name = command_name(command);
        let started = Instant::now();
        info!(command = name, "Command started");
        let result = self.execute_inner(command).await;
        match &result {
            Ok(output) => info!(
                command = name,
                exit_code = output.exit_code,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            ),
            Err(e) => warn!(command = name, error = %map_error(e), "Command failed"),
        }
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, CoderError> {
        match command {
            Commands::Plan {
                idea,
                idea_file,
                format,
                filter,
                limit,
            } => {
                let idea = self.resolve_idea(idea.as_deref(), idea_file.as_deref())?;
                let filter = parse_filter(filter.as_deref())?;
                let pipeline = self.connect()?;
                let plan = pipeline.plan(&idea, &filter, *limit).await?;
                let text = match format.as_str() {
                    "yaml" => format_plan_yaml(&plan)?,
                    _ => format_plan_text(&plan),
                };
                Ok(CommandOutput::ok(text))
            }
            Commands::Run {
                idea,
                idea_file,
                plan_file,
                yes,
                strict,
                format,
                filter,
                limit,
            } => {
                let filter = parse_filter(filter.as_deref())?;
                let pipeline = self.connect()?;
                let plan = match plan_file {
                    Some(path) => Plan::from_yaml(&self.read_input(path)?)?,
                    None => {
                        let idea = self.resolve_idea(idea.as_deref(), idea_file.as_deref())?;
                        pipeline.plan(&idea, &filter, *limit).await?
                    }
                };
                if !*yes && !confirm_run(&plan)? {
                    return Ok(CommandOutput::ok("Run cancelled.".to_string()));
                }

                let report = pipeline.execute(&plan, &filter, *limit).await?;
                let mut text = match format.as_str() {
                    "json" => format_run_report_json(&report)?,
                    _ => format_run_report_text(&report),
                };
                let mut exit_code = 0;
                if *strict && report.outcome == RunOutcome::Partial {
                    if let (Err(e), "text") = (report.ensure_complete(), format.as_str()) {
                        text.push_str(&format!("\n{}", map_error(&e)));
                    }
                    exit_code = EXIT_PARTIAL_RUN;
                }
                Ok(CommandOutput { text, exit_code })
            }
            Commands::Generate {
                task,
                filter,
                limit,
            } => {
                let filter = parse_filter(filter.as_deref())?;
                let generated = self.connect()?.generate(task, &filter, *limit).await?;
                Ok(CommandOutput::ok(format_generated_code(&generated)))
            }
            Commands::Search {
                query,
                limit,
                filter,
            } => {
                let filter = parse_filter(filter.as_deref())?;
                let context = self.connect()?.search(query, &filter, *limit).await?;
                if context.is_empty() {
                    Ok(CommandOutput::ok("No documents found.".to_string()))
                } else {
                    Ok(CommandOutput::ok(context))
                }
            }
            Commands::Research {
                idea,
                idea_file,
                format,
                filter,
            } => {
                let idea = self.resolve_idea(idea.as_deref(), idea_file.as_deref())?;
                let filter = parse_filter(filter.as_deref())?;
                let answers = self.connect()?.research(&idea, &filter).await?;
                let text = match format.as_str() {
                    "json" => format_research_json(&answers)?,
                    _ => format_research_text(&answers),
                };
                Ok(CommandOutput::ok(text))
            }
            Commands::Document {
                file,
                store,
                format,
            } => {
                let text = self.read_input(file)?;
                let (documents, stored) = self.connect()?.document(&text, *store).await?;
                let text = match format.as_str() {
                    "json" => format_documents_json(&documents, stored)?,
                    _ => format_documents_text(&documents, stored),
                };
                Ok(CommandOutput::ok(text))
            }
            Commands::Config { command } => self.handle_config_command(command),
        }
    }

    fn handle_config_command(&self, command: &ConfigCommands) -> Result<CommandOutput, CoderError> {
        match command {
            ConfigCommands::Validate => {
                let result = self.config.validate();
                let exit_code = if result.is_ok() { 0 } else { 1 };
                Ok(CommandOutput {
                    text: format_config_validation(&self.config, &result),
                    exit_code,
                })
            }
            ConfigCommands::Show => {
                let text = toml::to_string_pretty(&redacted(&self.config)).map_err(|e| {
                    CoderError::ConfigError(format!("Failed to render configuration: {}", e))
                })?;
                Ok(CommandOutput::ok(text))
            }
        }
    }

    fn connect(&self) -> Result<PipelineRun, CoderError> {
        (self.connector)(&self.config)
    }

    fn resolve_idea(&self, idea: Option<&str>, idea_file: Option<&Path>) -> Result<String, CoderError> {
        let idea = match (idea, idea_file) {
            (Some(text), _) => text.to_string(),
            (None, Some(path)) => self.read_input(path)?,
            (None, None) => {
                return Err(CoderError::ConfigError(
                    "An idea is required: pass it as text or with --idea-file".to_string(),
                ))
            }
        };
        if idea.trim().is_empty() {
            return Err(CoderError::ConfigError("The idea is empty".to_string()));
        }
        Ok(idea)
    }

    /// Relative paths resolve against the workspace root.
    fn read_input(&self, path: &Path) -> Result<String, CoderError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };
        std::fs::read_to_string(&path).map_err(|e| {
            CoderError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })
    }
}

fn parse_filter(raw: Option<&str>) -> Result<SearchFilter, CoderError> {
    match raw {
        Some(raw) => SearchFilter::parse(raw),
        None => Ok(SearchFilter::empty()),
    }
}

fn confirm_run(plan: &Plan) -> Result<bool, CoderError> {
    eprintln!("{}", format_plan_text(plan));
    dialoguer::Confirm::new()
        .with_prompt(format!(
            "Execute {} code step(s) against the warehouse?",
            plan.code_step_count()
        ))
        .default(false)
        .interact()
        .map_err(|e| CoderError::ConfigError(format!("Failed to get user input: {}", e)))
}

fn redacted(config: &CoderConfig) -> CoderConfig {
    const MASK: &str = "********";
    let mut config = config.clone();
    if config.warehouse.token.is_some() {
        config.warehouse.token = Some(MASK.to_string());
    }
    if config.completion.api_key.is_some() {
        config.completion.api_key = Some(MASK.to_string());
    }
    config
}
