//! Shared test utilities for integration tests
//!
//! Capability fakes built on the public traits, plus XDG isolation for
//! configuration loading tests.

use async_trait::async_trait;
use parking_lot::Mutex as PlMutex;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use warehouse_coder::completion::CompletionCapability;
use warehouse_coder::config::CoderConfig;
use warehouse_coder::error::CoderError;
use warehouse_coder::executor::StatementCapability;
use warehouse_coder::pipeline::PipelineRun;
use warehouse_coder::retrieval::{RetrievedDocument, SearchCapability, SearchFilter};
use warehouse_coder::warehouse::{Binding, ResultSet};

/// Global mutex to serialize environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir`, then
/// restore the previous values.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let home = std::env::var("HOME").ok();
    let xdg_config_home = std::env::var("XDG_CONFIG_HOME").ok();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = f();

    match home {
        Some(v) => std::env::set_var("HOME", v),
        None => std::env::remove_var("HOME"),
    }
    match xdg_config_home {
        Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
    result
}

/// Configuration good enough to pass validation; nothing connects to it.
pub fn test_config() -> CoderConfig {
    let mut config = CoderConfig::default();
    config.warehouse.account_url = "https://acme.example.com".to_string();
    config.warehouse.token = Some("test-token".to_string());
    config
}

pub struct FakeSearch {
    documents: Vec<RetrievedDocument>,
    queries: PlMutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            queries: PlMutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchCapability for FakeSearch {
    async fn search(
        &self,
        query: &str,
        _columns: &[String],
        _filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, CoderError> {
        self.queries.lock().push(query.to_string());
        Ok(self.documents.iter().take(limit).cloned().collect())
    }
}

pub struct FakeCompletion {
    responses: PlMutex<VecDeque<String>>,
    prompts: PlMutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: PlMutex::new(responses.iter().map(|r| r.to_string()).collect()),
            prompts: PlMutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionCapability for FakeCompletion {
    async fn complete(&self, _model: &str, prompt: &str) -> Result<String, CoderError> {
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| CoderError::Completion("no response left".to_string()))
    }

    fn backend_name(&self) -> &str {
        "fake"
    }
}

/// Fails any statement containing one of the configured patterns.
pub struct FakeWarehouse {
    failures: Vec<(String, String)>,
    executed: PlMutex<Vec<(String, Vec<Binding>)>>,
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self {
            failures: Vec::new(),
            executed: PlMutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, pattern: &str, message: &str) -> Self {
        self.failures.push((pattern.to_string(), message.to_string()));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn bindings(&self) -> Vec<Vec<Binding>> {
        self.executed.lock().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl StatementCapability for FakeWarehouse {
    async fn execute(&self, statement: &str, bindings: &[Binding]) -> Result<ResultSet, CoderError> {
        self.executed
            .lock()
            .push((statement.to_string(), bindings.to_vec()));
        if let Some((_, message)) = self
            .failures
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
        {
            return Err(CoderError::StatementExecution(message.clone()));
        }
        Ok(ResultSet {
            columns: vec!["status".to_string()],
            rows: vec![vec![Some("Statement executed successfully.".to_string())]],
        })
    }
}

pub struct Fakes {
    pub search: Arc<FakeSearch>,
    pub completion: Arc<FakeCompletion>,
    pub warehouse: Arc<FakeWarehouse>,
}

impl Fakes {
    pub fn new(responses: &[&str], warehouse: FakeWarehouse) -> Self {
        Self {
            search: Arc::new(FakeSearch::new(Vec::new())),
            completion: Arc::new(FakeCompletion::new(responses)),
            warehouse: Arc::new(warehouse),
        }
    }

    pub fn pipeline(&self, config: CoderConfig) -> PipelineRun {
        PipelineRun::with_capabilities(
            config,
            self.search.clone(),
            self.completion.clone(),
            self.warehouse.clone(),
        )
        .unwrap()
    }
}

/// Plan document with one documentation step and two code steps.
pub const ORDERS_PLAN: &str = r#"steps:
  - step_name: Describe the model
    step_type: documentation
    long_step_description: Explain the orders table and its view.
    objective: Document the design
    context: ""
    object:
      name: ORDERS
      type: table
  - step_name: Create orders table
    step_type: sql_code
    long_step_description: Create the ORDERS table with an id and an amount.
    objective: Store orders
    context: Amounts are numbers
    object:
      name: ORDERS
      type: table
  - step_name: Create amount view
    step_type: sql_code
    long_step_description: Create a view exposing order amounts.
    objective: Read amounts
    context: Builds on ORDERS
    object:
      name: V_AMOUNTS
      type: view
"#;
