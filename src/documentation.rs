//! Documentation workflow: turn free text into catalogued markdown documents
//! and optionally store them in the warehouse.

use crate::completion::{strip_code_fences, TextCompletion};
use crate::error::CoderError;
use crate::executor::StatementCapability;
use crate::prompt::{PromptLibrary, PromptTemplate, DOCUMENTATION_TEMPLATE};
use crate::warehouse::Binding;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Documentation targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationConfig {
    /// Table holding stored documents (`CATEGORY`, `NAME` columns)
    #[serde(default = "default_table")]
    pub table: String,

    /// Procedure called as `(markdown, category, name)` to store a document
    #[serde(default = "default_store_procedure")]
    pub store_procedure: String,
}

fn default_table() -> String {
    "SNOWFLAKE_CODER.APP.SNOWFLAKE_DOCUMENTATION".to_string()
}

fn default_store_procedure() -> String {
    "SNOWFLAKE_CODER.APP.SPLIT_TEXT_AND_STORE".to_string()
}

impl Default for DocumentationConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            store_procedure: default_store_procedure(),
        }
    }
}

impl DocumentationConfig {
    /// Both names are interpolated into statement text, so only plain
    /// (optionally qualified) identifiers are accepted.
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in [("table", &self.table), ("store_procedure", &self.store_procedure)] {
            if !is_qualified_identifier(value) {
                return Err(format!("Invalid {} name '{}'", key, value));
            }
        }
        Ok(())
    }
}

fn is_qualified_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub name: String,
    pub category: String,
    pub markdown: String,
}

#[derive(Deserialize)]
struct GeneratedDocs {
    generated_docs: Vec<GeneratedDocument>,
}

pub struct Documentator {
    statements: Arc<dyn StatementCapability>,
    completion: Arc<TextCompletion>,
    template: PromptTemplate,
    model: String,
    config: DocumentationConfig,
}

impl Documentator {
    pub fn new(
        statements: Arc<dyn StatementCapability>,
        completion: Arc<TextCompletion>,
        prompts: &PromptLibrary,
        model: impl Into<String>,
        config: DocumentationConfig,
    ) -> Result<Self, CoderError> {
        config.validate().map_err(CoderError::ConfigError)?;
        Ok(Self {
            statements,
            completion,
            template: prompts.get(DOCUMENTATION_TEMPLATE)?.clone(),
            model: model.into(),
            config,
        })
    }

    /// `<category> - <name>` for every stored document.
    pub async fn existing_documents(&self) -> Result<Vec<String>, CoderError> {
        let statement = format!(
            "SELECT DISTINCT CATEGORY || ' - ' || NAME AS EXIST_DOCUMENTATION FROM {}",
            self.config.table
        );
        let result = self.statements.execute(&statement, &[]).await?;
        Ok(result.column_values("EXIST_DOCUMENTATION"))
    }

    pub async fn generate(&self, text: &str) -> Result<Vec<GeneratedDocument>, CoderError> {
        let existing = self.existing_documents().await?;
        let existing_docs = existing
            .iter()
            .map(|d| format!("{}\n", d))
            .collect::<String>();
        let prompt = self.template.render(&[
            ("existing_docs", existing_docs.as_str()),
            ("text_to_document", text),
        ])?;
        let raw = self.completion.complete(&self.model, &prompt).await?;
        let documents = parse_generated_docs(&raw)?;
        info!(
            existing = existing.len(),
            generated = documents.len(),
            "Documentation generated"
        );
        Ok(documents)
    }

    /// Store each document through the configured procedure, in order.
    pub async fn store(&self, documents: &[GeneratedDocument]) -> Result<usize, CoderError> {
        let statement = format!("CALL {}(?, ?, ?)", self.config.store_procedure);
        for document in documents {
            self.statements
                .execute(
                    &statement,
                    &[
                        Binding::text(&document.markdown),
                        Binding::text(&document.category),
                        Binding::text(&document.name),
                    ],
                )
                .await?;
            info!(name = %document.name, category = %document.category, "Document stored");
        }
        Ok(documents.len())
    }
}

pub fn parse_generated_docs(raw: &str) -> Result<Vec<GeneratedDocument>, CoderError> {
    let parsed: GeneratedDocs = serde_yaml::from_str(&strip_code_fences(raw))
        .map_err(|e| CoderError::PlanParse(format!("Invalid documentation document: {}", e)))?;
    Ok(parsed.generated_docs)
}
