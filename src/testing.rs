//! Scripted capability doubles shared by unit tests.

use crate::completion::CompletionCapability;
use crate::error::CoderError;
use crate::executor::StatementCapability;
use crate::retrieval::{RetrievedDocument, SearchCapability, SearchFilter};
use crate::warehouse::{Binding, ResultSet};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct SearchCall {
    pub query: String,
    pub columns: Vec<String>,
    pub filter: SearchFilter,
    pub limit: usize,
}

/// Returns the same documents (truncated to `limit`) for every query.
pub(crate) struct StaticSearch {
    documents: Vec<RetrievedDocument>,
    calls: Mutex<Vec<SearchCall>>,
}

impl StaticSearch {
    pub fn new(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SearchCapability for StaticSearch {
    async fn search(
        &self,
        query: &str,
        columns: &[String],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, CoderError> {
        self.calls.lock().push(SearchCall {
            query: query.to_string(),
            columns: columns.to_vec(),
            filter: filter.clone(),
            limit,
        });
        Ok(self.documents.iter().take(limit).cloned().collect())
    }
}

/// Answers completions from a queue of canned responses.
pub(crate) struct ScriptedCompletion {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().clone()
    }
}

#[async_trait]
impl CompletionCapability for ScriptedCompletion {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CoderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.prompts.lock().push(prompt.to_string());
        self.models.lock().push(model.to_string());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| CoderError::Completion("No scripted response left".to_string()))
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}

/// Statement double: fails any statement containing a registered pattern and
/// answers matching statements with canned result sets.
pub(crate) struct ScriptedStatements {
    failures: Vec<(String, String)>,
    results: Vec<(String, ResultSet)>,
    executed: Mutex<Vec<(String, Vec<Binding>)>>,
    delay: Option<Duration>,
}

impl ScriptedStatements {
    pub fn new() -> Self {
        Self {
            failures: Vec::new(),
            results: Vec::new(),
            executed: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn fail_when(mut self, pattern: &str, message: &str) -> Self {
        self.failures.push((pattern.to_string(), message.to_string()));
        self
    }

    pub fn respond_with(mut self, pattern: &str, result: ResultSet) -> Self {
        self.results.push((pattern.to_string(), result));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn bindings(&self) -> Vec<Vec<Binding>> {
        self.executed.lock().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl StatementCapability for ScriptedStatements {
    async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
    ) -> Result<ResultSet, CoderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executed
            .lock()
            .push((statement.to_string(), bindings.to_vec()));
        if let Some((_, message)) = self.failures.iter().find(|(p, _)| statement.contains(p)) {
            return Err(CoderError::StatementExecution(message.clone()));
        }
        Ok(self
            .results
            .iter()
            .find(|(p, _)| statement.contains(p))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| ResultSet {
                columns: vec!["status".to_string()],
                rows: vec![vec![Some("Statement executed successfully.".to_string())]],
            }))
    }
}

/// Base URL of a local endpoint that accepts connections and never answers.
pub(crate) async fn silent_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    url
}

/// Session against `account_url` with a long statement timeout.
pub(crate) fn session_at(account_url: String) -> crate::warehouse::WarehouseSession {
    let config = crate::warehouse::WarehouseConfig {
        account_url,
        token: Some("test-token".to_string()),
        statement_timeout_secs: 120,
        ..crate::warehouse::WarehouseConfig::default()
    };
    crate::warehouse::WarehouseSession::connect(&config).unwrap()
}
