//! CLI help: stable command names for logging.

use crate::cli::parse::{Commands, ConfigCommands};

/// Command name string for logs (e.g. "run", "config.validate").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Plan { .. } => "plan",
        Commands::Run { .. } => "run",
        Commands::Generate { .. } => "generate",
        Commands::Search { .. } => "search",
        Commands::Research { .. } => "research",
        Commands::Document { .. } => "document",
        Commands::Config { command } => match command {
            ConfigCommands::Validate => "config.validate",
            ConfigCommands::Show => "config.show",
        },
    }
}
