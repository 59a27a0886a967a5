//! Warehouse Session
//!
//! One authenticated handle to the warehouse REST surface: the SQL statements API
//! (used for code execution and warehouse-hosted completion) and the semantic
//! search service API. A session is created per pipeline run and shared by
//! reference among that run's components; concurrent runs connect their own.

use crate::error::{CoderError, WarehouseError};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Warehouse connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Account URL, e.g. https://<account>.snowflakecomputing.com
    #[serde(default)]
    pub account_url: String,

    /// Bearer token (programmatic access token, OAuth token or key-pair JWT)
    #[serde(default)]
    pub token: Option<String>,

    /// Value of the token type header
    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub role: Option<String>,

    /// Upper bound for one statement, including asynchronous polling
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    /// Delay between status polls of an asynchronous statement
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_token_type() -> String {
    "PROGRAMMATIC_ACCESS_TOKEN".to_string()
}

fn default_statement_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            account_url: String::new(),
            token: None,
            token_type: default_token_type(),
            database: None,
            schema: None,
            warehouse: None,
            role: None,
            statement_timeout_secs: default_statement_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WarehouseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.account_url.trim().is_empty() {
            return Err("Account URL cannot be empty".to_string());
        }
        if !self.account_url.starts_with("https://") && !self.account_url.starts_with("http://") {
            return Err(format!(
                "Account URL must start with http:// or https://, got '{}'",
                self.account_url
            ));
        }
        if self.statement_timeout_secs == 0 {
            return Err("Statement timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

/// Positional statement binding (`?` placeholders, 1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

impl Binding {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "TEXT",
            value: value.into(),
        }
    }
}

/// Rows returned by a statement (first partition only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn first_row(&self) -> Option<ResultRow> {
        self.rows.first().map(|values| ResultRow {
            columns: self.columns.clone(),
            values: values.clone(),
        })
    }

    /// Values of one column across all rows, nulls skipped.
    pub fn column_values(&self, column: &str) -> Vec<String> {
        let Some(index) = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
        else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index).cloned().flatten())
            .collect()
    }
}

/// One result row with its column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub columns: Vec<String>,
    pub values: Vec<Option<String>>,
}

impl ResultRow {
    /// Case-insensitive column lookup.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.as_deref())
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().and_then(|v| v.as_deref())
    }
}

impl std::fmt::Display for ResultRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| format!("{}={}", c, v.as_deref().unwrap_or("NULL")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Location of a semantic search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchServiceRef {
    pub database: String,
    pub schema: String,
    pub service: String,
}

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(rename = "resultSetMetaData")]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    #[serde(rename = "statementHandle")]
    statement_handle: Option<String>,
    #[serde(rename = "statementStatusUrl")]
    statement_status_url: Option<String>,
}

#[derive(Deserialize)]
struct ResultSetMetaData {
    #[serde(rename = "rowType", default)]
    row_type: Vec<RowType>,
}

#[derive(Deserialize)]
struct RowType {
    name: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    #[serde(rename = "sqlState")]
    sql_state: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Map<String, Value>>,
}

// Helper function to map transport errors to WarehouseError
fn map_http_error(error: reqwest::Error) -> WarehouseError {
    if error.is_timeout() {
        WarehouseError::Timeout(error.to_string())
    } else if error.is_connect() {
        WarehouseError::Transport(format!("Connection error: {}", error))
    } else {
        WarehouseError::Transport(format!("HTTP error: {}", error))
    }
}

/// Map a non-success response to WarehouseError, keeping the server's error
/// code and message when the body carries them.
async fn map_error_response(response: Response) -> WarehouseError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    classify_status(status, &text)
}

fn classify_status(status: StatusCode, body: &str) -> WarehouseError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.to_string());
    match status.as_u16() {
        401 | 403 => WarehouseError::Unauthorized(message),
        429 => WarehouseError::RateLimited(message),
        408 | 504 => WarehouseError::Timeout(message),
        400 | 422 => WarehouseError::Rejected {
            code: parsed
                .as_ref()
                .and_then(|b| b.code.clone())
                .unwrap_or_else(|| status.as_u16().to_string()),
            sql_state: parsed.and_then(|b| b.sql_state),
            message,
        },
        _ => WarehouseError::Transport(format!("Request failed with status {}: {}", status, message)),
    }
}

const WAREHOUSE_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP requests may outlive the server-side timeout by this much.
const WAREHOUSE_HTTP_SLACK: Duration = Duration::from_secs(5);

fn build_warehouse_http_client(request_timeout: Duration) -> Result<Client, CoderError> {
    Client::builder()
        .connect_timeout(WAREHOUSE_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .user_agent(concat!("warehouse-coder/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CoderError::Session(format!("Failed to create HTTP client: {}", e)))
}

/// Authenticated warehouse handle.
pub struct WarehouseSession {
    client: Client,
    account_url: String,
    token: String,
    token_type: String,
    database: Option<String>,
    schema: Option<String>,
    warehouse: Option<String>,
    role: Option<String>,
    statement_timeout: Duration,
    poll_interval: Duration,
    session_id: String,
    statements_submitted: AtomicU64,
}

impl WarehouseSession {
    /// Build a session from configuration. No network traffic happens until
    /// the first statement or search.
    pub fn connect(config: &WarehouseConfig) -> Result<Self, CoderError> {
        config.validate().map_err(CoderError::ConfigError)?;
        let token = config.token.clone().ok_or_else(|| {
            CoderError::ConfigError(
                "Warehouse token is not configured. Set [warehouse].token or WHCODER_WAREHOUSE__TOKEN."
                    .to_string(),
            )
        })?;
        let statement_timeout = config.statement_timeout();
        let client = build_warehouse_http_client(statement_timeout + WAREHOUSE_HTTP_SLACK)?;
        let session_id = new_session_id(&config.account_url);
        debug!(session_id = %session_id, account_url = %config.account_url, "Warehouse session created");

        Ok(Self {
            client,
            account_url: config.account_url.trim_end_matches('/').to_string(),
            token,
            token_type: config.token_type.clone(),
            database: config.database.clone(),
            schema: config.schema.clone(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
            statement_timeout,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(50)),
            session_id,
            statements_submitted: AtomicU64::new(0),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn statements_submitted(&self) -> u64 {
        self.statements_submitted.load(Ordering::Relaxed)
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Submit one statement through the SQL API and wait for its result.
    /// Asynchronous executions are polled until done or the statement timeout
    /// elapses.
    pub async fn submit_statement(
        &self,
        statement: &str,
        bindings: &[Binding],
    ) -> Result<ResultSet, WarehouseError> {
        self.submit_statement_within(statement, bindings, self.statement_timeout)
            .await
    }

    /// Like [`submit_statement`](Self::submit_statement), bounded by `timeout`
    /// on the server and over HTTP instead of the session statement timeout.
    pub async fn submit_statement_within(
        &self,
        statement: &str,
        bindings: &[Binding],
        timeout: Duration,
    ) -> Result<ResultSet, WarehouseError> {
        let seq = self.statements_submitted.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let body = self.statement_body(statement, bindings, timeout);
        trace!(session_id = %self.session_id, seq, bindings = bindings.len(), "Submitting statement");

        let url = format!("{}/api/v2/statements", self.account_url);
        let response = self
            .authorized(self.client.post(&url))
            .timeout(timeout + WAREHOUSE_HTTP_SLACK)
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        let mut parsed = self.read_statement_response(response).await?;
        while parsed.result_set_meta_data.is_none() {
            let status_url = match (&parsed.statement_status_url, &parsed.statement_handle) {
                (Some(path), _) => format!("{}{}", self.account_url, path),
                (None, Some(handle)) => format!("{}/api/v2/statements/{}", self.account_url, handle),
                (None, None) => {
                    return Err(WarehouseError::MalformedResponse(
                        "Response carried neither a result set nor a statement handle".to_string(),
                    ))
                }
            };
            if started.elapsed() >= timeout {
                return Err(WarehouseError::Timeout(format!(
                    "Statement still running after {}s",
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .authorized(self.client.get(&status_url))
                .timeout(timeout + WAREHOUSE_HTTP_SLACK)
                .send()
                .await
                .map_err(map_http_error)?;
            parsed = self.read_statement_response(response).await?;
        }

        let columns = parsed
            .result_set_meta_data
            .map(|meta| meta.row_type.into_iter().map(|r| r.name).collect())
            .unwrap_or_default();
        debug!(
            session_id = %self.session_id,
            seq,
            rows = parsed.data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Statement completed"
        );
        Ok(ResultSet {
            columns,
            rows: parsed.data,
        })
    }

    /// Query a semantic search service. The filter is forwarded verbatim.
    pub async fn query_search_service(
        &self,
        service: &SearchServiceRef,
        query: &str,
        columns: &[String],
        filter: &Value,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<Map<String, Value>>, WarehouseError> {
        let url = format!(
            "{}/api/v2/databases/{}/schemas/{}/cortex-search-services/{}:query",
            self.account_url, service.database, service.schema, service.service
        );
        let body = json!({
            "query": query,
            "columns": columns,
            "filter": filter,
            "limit": limit,
        });

        let response = self
            .authorized(self.client.post(&url))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;
        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::MalformedResponse(format!("Failed to parse search response: {}", e)))?;
        Ok(parsed.results)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .header("Accept", "application/json")
    }

    fn statement_body(&self, statement: &str, bindings: &[Binding], timeout: Duration) -> Value {
        let mut body = json!({
            "statement": statement,
            "timeout": timeout.as_secs(),
        });
        for (key, value) in [
            ("database", &self.database),
            ("schema", &self.schema),
            ("warehouse", &self.warehouse),
            ("role", &self.role),
        ] {
            if let Some(value) = value {
                body[key] = json!(value);
            }
        }
        if !bindings.is_empty() {
            let bound: BTreeMap<String, &Binding> = bindings
                .iter()
                .enumerate()
                .map(|(i, b)| ((i + 1).to_string(), b))
                .collect();
            body["bindings"] = json!(bound);
        }
        body
    }

    async fn read_statement_response(
        &self,
        response: Response,
    ) -> Result<StatementResponse, WarehouseError> {
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            return response.json().await.map_err(|e| {
                WarehouseError::MalformedResponse(format!("Failed to parse statement response: {}", e))
            });
        }
        Err(map_error_response(response).await)
    }
}

fn new_session_id(account_url: &str) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let digest = blake3::hash(format!("{}:{}", account_url, now).as_bytes());
    format!("wh-{}-{}", now, &hex::encode(digest.as_bytes())[..8])
}
