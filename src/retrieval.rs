//! Context retrieval over a semantic search capability.
//!
//! The retriever only concatenates documents into prompt context; it never
//! interprets fields beyond the configured key and value columns.

use crate::error::{CoderError, WarehouseError};
use crate::warehouse::{SearchServiceRef, WarehouseSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default number of documents per search.
pub const DEFAULT_LIMIT: usize = 10;

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_service")]
    pub service: String,

    /// Columns requested from the service, in order
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    /// Column labelling each rendered context block
    #[serde(default = "default_key_column")]
    pub key_column: String,

    /// Column holding the context text
    #[serde(default = "default_value_column")]
    pub value_column: String,

    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "SNOWFLAKE_CODER".to_string()
}

fn default_schema() -> String {
    "APP".to_string()
}

fn default_service() -> String {
    "ADMIN_SNOWFLAKE_DOCUMENTATION_RAG".to_string()
}

fn default_columns() -> Vec<String> {
    ["PART", "CATEGORY", "NAME", "DEFINITION"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_key_column() -> String {
    "NAME".to_string()
}

fn default_value_column() -> String {
    "DEFINITION".to_string()
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_search_timeout_secs() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            schema: default_schema(),
            service: default_service(),
            columns: default_columns(),
            key_column: default_key_column(),
            value_column: default_value_column(),
            limit: default_limit(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.service.trim().is_empty() {
            return Err("Search service name cannot be empty".to_string());
        }
        if self.limit == 0 {
            return Err("Search limit must be greater than zero".to_string());
        }
        for column in [&self.key_column, &self.value_column] {
            if !self.columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(format!(
                    "Column '{}' must be listed in search.columns",
                    column
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn service_ref(&self) -> SearchServiceRef {
        SearchServiceRef {
            database: self.database.clone(),
            schema: self.schema.clone(),
            service: self.service.clone(),
        }
    }
}

/// Opaque structured predicate forwarded verbatim to the search capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFilter(pub Value);

impl SearchFilter {
    /// The match-everything filter (`{}`).
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn parse(raw: &str) -> Result<Self, CoderError> {
        serde_json::from_str(raw)
            .map(Self)
            .map_err(|e| CoderError::Retrieval(format!("Invalid search filter: {}", e)))
    }
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self::empty()
    }
}

/// One search hit, keyed by the requested column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub fields: Map<String, Value>,
}

impl RetrievedDocument {
    /// Text of a field; strings are unquoted, other JSON values are rendered,
    /// absent fields are empty. Lookup falls back to a case-insensitive match.
    pub fn field_text(&self, column: &str) -> String {
        let value = self.fields.get(column).or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        });
        match value {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Semantic search capability: `search(query, columns, filter, limit)`.
#[async_trait]
pub trait SearchCapability: Send + Sync {
    async fn search(
        &self,
        query: &str,
        columns: &[String],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, CoderError>;
}

/// Warehouse-hosted search service bound to one service location.
pub struct CortexSearchService {
    session: Arc<WarehouseSession>,
    service: SearchServiceRef,
    timeout: Duration,
}

impl CortexSearchService {
    /// `timeout` bounds each HTTP query.
    pub fn new(session: Arc<WarehouseSession>, service: SearchServiceRef, timeout: Duration) -> Self {
        Self {
            session,
            service,
            timeout,
        }
    }
}

#[async_trait]
impl SearchCapability for CortexSearchService {
    async fn search(
        &self,
        query: &str,
        columns: &[String],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, CoderError> {
        let results = self
            .session
            .query_search_service(&self.service, query, columns, &filter.0, limit, self.timeout)
            .await
            .map_err(|e| match e {
                WarehouseError::Timeout(_) => CoderError::Timeout {
                    operation: "search",
                    after: self.timeout,
                },
                other => CoderError::Retrieval(other.to_string()),
            })?;
        Ok(results
            .into_iter()
            .map(|fields| RetrievedDocument { fields })
            .collect())
    }
}

/// Retrieves documents and renders them as labelled prompt context.
pub struct ContextRetriever {
    search: Arc<dyn SearchCapability>,
    columns: Vec<String>,
    key_column: String,
    value_column: String,
    default_limit: usize,
    timeout: Duration,
}

impl ContextRetriever {
    pub fn new(search: Arc<dyn SearchCapability>, config: &SearchConfig) -> Self {
        Self {
            search,
            columns: config.columns.clone(),
            key_column: config.key_column.clone(),
            value_column: config.value_column.clone(),
            default_limit: config.limit,
            timeout: config.timeout(),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Ordered search results; `limit` falls back to the configured default.
    pub async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<Vec<RetrievedDocument>, CoderError> {
        let limit = limit.unwrap_or(self.default_limit);
        let documents = tokio::time::timeout(
            self.timeout,
            self.search.search(query, &self.columns, filter, limit),
        )
        .await
        .map_err(|_| CoderError::Timeout {
            operation: "search",
            after: self.timeout,
        })??;
        debug!(
            query_chars = query.len(),
            limit,
            returned = documents.len(),
            "Context retrieved"
        );
        Ok(documents)
    }

    /// Search and render in one call.
    pub async fn render_context(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<String, CoderError> {
        let documents = self.search(query, filter, limit).await?;
        Ok(self.render_documents(&documents))
    }

    /// `Context document <key>: <value>` blocks separated by a blank line.
    pub fn render_documents(&self, documents: &[RetrievedDocument]) -> String {
        documents
            .iter()
            .map(|doc| {
                format!(
                    "Context document {}: {}",
                    doc.field_text(&self.key_column),
                    doc.field_text(&self.value_column)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
