//! Text Completion
//!
//! Prompt-to-text inference behind one capability trait. Two backends:
//! warehouse-hosted `SNOWFLAKE.CORTEX.COMPLETE` (bound parameters or, for
//! substrates without binding, an interpolated literal with a sanitized prompt)
//! and any OpenAI-compatible chat completions endpoint.

use crate::error::CoderError;
use crate::warehouse::{Binding, WarehouseSession};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which service answers completion requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBackend {
    Warehouse,
    OpenAiCompatible,
}

/// How the prompt reaches the warehouse completion function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// `COMPLETE(?, ?)` with bound model and prompt
    Bound,
    /// Model and prompt embedded as string literals; requires sanitization
    Interpolated,
}

/// Completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_backend")]
    pub backend: CompletionBackend,

    #[serde(default = "default_mode")]
    pub mode: CompletionMode,

    /// Base URL for the OpenAI-compatible backend, e.g. http://localhost:8080/v1
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature for the OpenAI-compatible backend
    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_backend() -> CompletionBackend {
    CompletionBackend::Warehouse
}

fn default_mode() -> CompletionMode {
    CompletionMode::Bound
}

fn default_completion_timeout_secs() -> u64 {
    180
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            mode: default_mode(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_completion_timeout_secs(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl CompletionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("Completion timeout must be greater than zero".to_string());
        }
        if self.backend == CompletionBackend::OpenAiCompatible {
            let endpoint = self.endpoint.as_deref().unwrap_or("");
            if endpoint.is_empty() {
                return Err("The openai_compatible backend requires an endpoint".to_string());
            }
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Invalid completion endpoint '{}'", endpoint));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Prompt-to-text capability: `complete(model_id, prompt) -> text`.
#[async_trait]
pub trait CompletionCapability: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CoderError>;

    /// Short backend name for logs
    fn backend_name(&self) -> &str;
}

/// Escape a value for embedding inside a single-quoted SQL literal: doubles
/// single quotes and escapes backslashes, so the literal cannot end early.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt.replace('\\', "\\\\").replace('\'', "''")
}

/// Remove markdown code-fence markers (with any language tag) and trim.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'))
            .unwrap_or(rest.len());
        rest = &rest[tag_len..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Completion front used by every pipeline stage. Bounds each call with a
/// timeout and never retries.
pub struct TextCompletion {
    backend: Arc<dyn CompletionCapability>,
    timeout: Duration,
}

impl TextCompletion {
    pub fn new(backend: Arc<dyn CompletionCapability>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, CoderError> {
        debug!(
            backend = self.backend.backend_name(),
            model,
            prompt_chars = prompt.len(),
            "Requesting completion"
        );
        let text = tokio::time::timeout(self.timeout, self.backend.complete(model, prompt))
            .await
            .map_err(|_| CoderError::Timeout {
                operation: "completion",
                after: self.timeout,
            })??;
        debug!(model, response_chars = text.len(), "Completion received");
        Ok(text)
    }
}

/// Warehouse-hosted completion through the SQL statements API.
pub struct WarehouseCompletion {
    session: Arc<WarehouseSession>,
    mode: CompletionMode,
    timeout: Duration,
}

impl WarehouseCompletion {
    /// `timeout` bounds the completion statement on the server and over HTTP.
    pub fn new(session: Arc<WarehouseSession>, mode: CompletionMode, timeout: Duration) -> Self {
        Self {
            session,
            mode,
            timeout,
        }
    }

    /// Statement text and bindings for one completion call.
    pub fn statement(mode: CompletionMode, model: &str, prompt: &str) -> (String, Vec<Binding>) {
        match mode {
            CompletionMode::Bound => (
                "SELECT SNOWFLAKE.CORTEX.COMPLETE(?, ?) AS RESPONSE".to_string(),
                vec![Binding::text(model), Binding::text(prompt)],
            ),
            CompletionMode::Interpolated => (
                format!(
                    "SELECT SNOWFLAKE.CORTEX.COMPLETE('{}', '{}') AS RESPONSE",
                    sanitize_prompt(model),
                    sanitize_prompt(prompt)
                ),
                Vec::new(),
            ),
        }
    }
}

#[async_trait]
impl CompletionCapability for WarehouseCompletion {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CoderError> {
        let (statement, bindings) = Self::statement(self.mode, model, prompt);
        let result = self
            .session
            .submit_statement_within(&statement, &bindings, self.timeout)
            .await
            .map_err(|e| CoderError::from_completion_failure(e, self.timeout))?;
        result
            .first_row()
            .and_then(|row| row.first_value().map(str::to_string))
            .ok_or_else(|| CoderError::Completion("Completion returned no rows".to_string()))
    }

    fn backend_name(&self) -> &str {
        "warehouse"
    }
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// Helper function to map HTTP errors to CoderError
fn map_http_error(error: reqwest::Error, after: Duration) -> CoderError {
    if error.is_timeout() {
        CoderError::Timeout {
            operation: "completion",
            after,
        }
    } else if error.is_connect() {
        CoderError::Completion(format!("Connection error: {}", error))
    } else {
        CoderError::Completion(format!("HTTP error: {}", error))
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI-compatible chat completions client. The prompt is sent as a single
/// user message; the model id is passed through unchanged.
pub struct ChatCompletionClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ChatCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, CoderError> {
        config.validate().map_err(CoderError::ConfigError)?;
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| CoderError::Completion(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionCapability for ChatCompletionClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CoderError> {
        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| map_http_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                401 | 403 => CoderError::CompletionAuthFailed(error_text),
                429 => CoderError::CompletionRateLimit(error_text),
                _ => CoderError::Completion(format!("Request failed with status {}: {}", status, error_text)),
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CoderError::Completion(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CoderError::Completion("No choices in response".to_string()))
    }

    fn backend_name(&self) -> &str {
        "openai_compatible"
    }
}

/// Build the configured completion backend for one run.
pub fn build_backend(
    config: &CompletionConfig,
    session: &Arc<WarehouseSession>,
) -> Result<Arc<dyn CompletionCapability>, CoderError> {
    Ok(match config.backend {
        CompletionBackend::Warehouse => {
            Arc::new(WarehouseCompletion::new(
                Arc::clone(session),
                config.mode,
                config.timeout(),
            ))
        }
        CompletionBackend::OpenAiCompatible => Arc::new(ChatCompletionClient::new(config)?),
    })
}
