//! Configuration System
//!
//! Layered configuration for the warehouse session, search service, model tiers,
//! repair policy and logging. Sources merge in order: built-in defaults, the
//! global user file, workspace files, then `WHCODER_*` environment variables.

use crate::completion::{CompletionBackend, CompletionConfig};
use crate::documentation::DocumentationConfig;
use crate::logging::LoggingConfig;
use crate::prompt::PromptsConfig;
use crate::repair::RepairPolicy;
use crate::retrieval::SearchConfig;
use crate::warehouse::WarehouseConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoderConfig {
    /// Warehouse connection used for statements, search and completion
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Semantic search service used for context retrieval
    #[serde(default)]
    pub search: SearchConfig,

    /// Model identifiers per pipeline stage
    #[serde(default)]
    pub models: ModelsConfig,

    /// Completion backend selection
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Generate-execute-repair budget and context policy
    #[serde(default)]
    pub repair: RepairPolicy,

    /// Documentation workflow targets
    #[serde(default)]
    pub documentation: DocumentationConfig,

    /// Prompt template overrides
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model identifiers are opaque strings; choosing a fast or a high-quality tier
/// per stage is purely a configuration decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model")]
    pub planner: String,
    #[serde(default = "default_model")]
    pub coder: String,
    #[serde(default = "default_model")]
    pub research: String,
    #[serde(default = "default_model")]
    pub documenter: String,
}

pub(crate) fn default_model() -> String {
    "claude-3-5-sonnet".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            planner: default_model(),
            coder: default_model(),
            research: default_model(),
            documenter: default_model(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Warehouse(String),
    Search(String),
    Models(String),
    Completion(String),
    Repair(String),
    Documentation(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Warehouse(msg) => write!(f, "Warehouse: {}", msg),
            ValidationError::Search(msg) => write!(f, "Search: {}", msg),
            ValidationError::Models(msg) => write!(f, "Models: {}", msg),
            ValidationError::Completion(msg) => write!(f, "Completion: {}", msg),
            ValidationError::Repair(msg) => write!(f, "Repair: {}", msg),
            ValidationError::Documentation(msg) => write!(f, "Documentation: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CoderConfig {
    /// Validate the entire configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.warehouse.validate() {
            errors.push(ValidationError::Warehouse(e));
        }
        if let Err(e) = self.search.validate() {
            errors.push(ValidationError::Search(e));
        }
        for (stage, model) in [
            ("planner", &self.models.planner),
            ("coder", &self.models.coder),
            ("research", &self.models.research),
            ("documenter", &self.models.documenter),
        ] {
            if model.trim().is_empty() {
                errors.push(ValidationError::Models(format!(
                    "Model for stage '{}' cannot be empty",
                    stage
                )));
            }
        }
        if let Err(e) = self.completion.validate() {
            errors.push(ValidationError::Completion(e));
        }
        if let Err(e) = self.repair.validate() {
            errors.push(ValidationError::Repair(e));
        }
        if let Err(e) = self.documentation.validate() {
            errors.push(ValidationError::Documentation(e));
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format '{}'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether this configuration needs an OpenAI-compatible endpoint instead of
    /// warehouse-hosted completion.
    pub fn uses_external_completion(&self) -> bool {
        matches!(self.completion.backend, CompletionBackend::OpenAiCompatible)
    }
}

/// Join validation errors into a single configuration error.
pub fn validation_failure(errors: &[ValidationError]) -> crate::error::CoderError {
    let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    crate::error::CoderError::ConfigError(format!(
        "Configuration validation failed:\n{}",
        error_msgs.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionMode;
    use crate::repair::EmptyCodePolicy;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Serializes tests that touch process-wide environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn valid_config() -> CoderConfig {
        let mut config = CoderConfig::default();
        config.warehouse.account_url = "https://acme.snowflakecomputing.com".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = CoderConfig::default();
        assert_eq!(config.repair.max_attempts, 3);
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.models.coder, "claude-3-5-sonnet");
        assert_eq!(config.completion.mode, CompletionMode::Bound);
        assert_eq!(config.repair.empty_code, EmptyCodePolicy::Resolve);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.repair.max_attempts = 0;
        config.models.planner = " ".to_string();
        config.search.key_column = "MISSING".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Repair(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Models(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Search(_))));
    }

    #[test]
    fn test_external_completion_requires_endpoint() {
        let mut config = valid_config();
        config.completion.backend = CompletionBackend::OpenAiCompatible;
        assert!(config.uses_external_completion());
        assert!(config.validate().is_err());

        config.completion.endpoint = Some("http://localhost:8080/v1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("whcoder.toml");

        std::fs::write(
            &config_file,
            r#"
[warehouse]
account_url = "https://acme.snowflakecomputing.com"
database = "SNOWFLAKE_CODER"
schema = "APP"

[search]
service = "DOCS_RAG"
columns = ["NAME", "DEFINITION"]
key_column = "NAME"
value_column = "DEFINITION"
limit = 5

[models]
planner = "mistral-large2"

[repair]
max_attempts = 4
empty_code = "retry"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&config_file).unwrap();
        assert_eq!(config.search.service, "DOCS_RAG");
        assert_eq!(config.search.limit, 5);
        assert_eq!(config.models.planner, "mistral-large2");
        assert_eq!(config.models.coder, "claude-3-5-sonnet");
        assert_eq!(config.repair.max_attempts, 4);
        assert_eq!(config.repair.empty_code, EmptyCodePolicy::Retry);
        assert_eq!(config.warehouse.database.as_deref(), Some("SNOWFLAKE_CODER"));
    }

    #[test]
    fn test_workspace_env_file_overrides_base_file() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let original_home = std::env::var("HOME").ok();
        std::env::set_var("HOME", temp_dir.path().join("no_home"));
        std::env::set_var("WHCODER_ENV", "staging");

        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[models]\ncoder = \"base-model\"\nplanner = \"base-planner\"\n",
        )
        .unwrap();
        std::fs::write(
            config_dir.join("staging.toml"),
            "[models]\ncoder = \"staging-model\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load(temp_dir.path()).unwrap();
        assert_eq!(config.models.coder, "staging-model");
        assert_eq!(config.models.planner, "base-planner");

        std::env::remove_var("WHCODER_ENV");
        match original_home {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }

    #[test]
    fn test_environment_overrides_files() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let original_home = std::env::var("HOME").ok();
        std::env::set_var("HOME", temp_dir.path().join("no_home"));
        std::env::set_var("WHCODER_REPAIR__MAX_ATTEMPTS", "5");

        let config = ConfigLoader::load(temp_dir.path()).unwrap();
        assert_eq!(config.repair.max_attempts, 5);

        std::env::remove_var("WHCODER_REPAIR__MAX_ATTEMPTS");
        match original_home {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }

    #[test]
    fn test_load_without_any_files_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let original_home = std::env::var("HOME").ok();
        std::env::remove_var("HOME");

        let config = ConfigLoader::load(temp_dir.path()).unwrap();
        assert_eq!(config.repair.max_attempts, 3);
        assert_eq!(config.search.limit, 10);

        if let Some(home) = original_home {
            std::env::set_var("HOME", home);
        }
    }
}
