//! CLI parse: clap types for whcoder. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// whcoder - plan, generate and repair warehouse code from natural-language ideas
#[derive(Parser)]
#[command(name = "whcoder")]
#[command(about = "Retrieval-augmented code generation for cloud data warehouses")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (holds config/)
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decompose an idea into a plan and print it
    Plan {
        /// The idea, as text
        idea: Option<String>,
        /// Read the idea from a file
        #[arg(long, conflicts_with = "idea")]
        idea_file: Option<PathBuf>,
        /// Output format (text or yaml)
        #[arg(long, default_value = "text")]
        format: String,
        /// Search filter as JSON, forwarded verbatim
        #[arg(long)]
        filter: Option<String>,
        /// Documents retrieved per search
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decompose an idea (or load a saved plan) and execute its code steps
    Run {
        /// The idea, as text
        idea: Option<String>,
        /// Read the idea from a file
        #[arg(long, conflicts_with = "idea")]
        idea_file: Option<PathBuf>,
        /// Execute a saved plan document instead of decomposing an idea
        #[arg(long, conflicts_with_all = ["idea", "idea_file"])]
        plan_file: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Exit non-zero when any step exhausts its attempts
        #[arg(long)]
        strict: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Search filter as JSON, forwarded verbatim
        #[arg(long)]
        filter: Option<String>,
        /// Documents retrieved per search
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Generate code for a task without executing it
    Generate {
        /// Task description
        task: String,
        /// Search filter as JSON, forwarded verbatim
        #[arg(long)]
        filter: Option<String>,
        /// Documents retrieved per search
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the retrieved context for a query
    Search {
        query: String,
        /// Maximum number of documents
        #[arg(long)]
        limit: Option<usize>,
        /// Search filter as JSON, forwarded verbatim
        #[arg(long)]
        filter: Option<String>,
    },
    /// Generate clarifying questions for an idea and answer them from documentation
    Research {
        /// The idea, as text
        idea: Option<String>,
        /// Read the idea from a file
        #[arg(long, conflicts_with = "idea")]
        idea_file: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Search filter as JSON, forwarded verbatim
        #[arg(long)]
        filter: Option<String>,
    },
    /// Turn a text file into documentation documents
    Document {
        /// File holding the text to document
        file: PathBuf,
        /// Store the generated documents in the warehouse
        #[arg(long)]
        store: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate the effective configuration
    Validate,
    /// Print the effective configuration as TOML (secrets redacted)
    Show,
}
