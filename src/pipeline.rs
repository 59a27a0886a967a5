//! Per-run composition root.
//!
//! A [`PipelineRun`] owns one warehouse session and the components built on
//! it. Concurrent runs must each connect their own `PipelineRun`.

use crate::codegen::{split_statements, CodeGenerator};
use crate::completion::{build_backend, CompletionCapability, TextCompletion};
use crate::config::{validation_failure, CoderConfig};
use crate::documentation::{Documentator, GeneratedDocument};
use crate::error::CoderError;
use crate::executor::{Executor, StatementCapability};
use crate::orchestrator::{Orchestrator, RunReport};
use crate::plan::{Plan, PlanDecomposer};
use crate::prompt::PromptLibrary;
use crate::repair::RepairLoop;
use crate::research::{QuestionResearcher, ResearchAnswer};
use crate::retrieval::{ContextRetriever, CortexSearchService, SearchCapability, SearchFilter};
use crate::warehouse::WarehouseSession;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Slack added on top of the warehouse statement timeout, which already
/// bounds polling on the server side.
const STATEMENT_TIMEOUT_GRACE: Duration = Duration::from_secs(10);

/// Generated code and its statements, not executed.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub code: String,
    pub statements: Vec<String>,
}

pub struct PipelineRun {
    config: CoderConfig,
    session_id: String,
    prompts: PromptLibrary,
    retriever: Arc<ContextRetriever>,
    completion: Arc<TextCompletion>,
    statements: Arc<dyn StatementCapability>,
    generator: Arc<CodeGenerator>,
    executor: Arc<Executor>,
}

impl PipelineRun {
    /// Validate configuration and open this run's warehouse session.
    pub fn connect(config: CoderConfig) -> Result<Self, CoderError> {
        config.validate().map_err(|errors| validation_failure(&errors))?;
        let session = Arc::new(WarehouseSession::connect(&config.warehouse)?);
        let search: Arc<dyn SearchCapability> = Arc::new(CortexSearchService::new(
            Arc::clone(&session),
            config.search.service_ref(),
            config.search.timeout(),
        ));
        let completion = build_backend(&config.completion, &session)?;
        let session_id = session.session_id().to_string();
        let statements: Arc<dyn StatementCapability> = session;
        Self::assemble(config, session_id, search, completion, statements)
    }

    /// Build a run over caller-supplied capabilities.
    pub fn with_capabilities(
        config: CoderConfig,
        search: Arc<dyn SearchCapability>,
        completion: Arc<dyn CompletionCapability>,
        statements: Arc<dyn StatementCapability>,
    ) -> Result<Self, CoderError> {
        Self::assemble(config, "local".to_string(), search, completion, statements)
    }

    fn assemble(
        config: CoderConfig,
        session_id: String,
        search: Arc<dyn SearchCapability>,
        completion: Arc<dyn CompletionCapability>,
        statements: Arc<dyn StatementCapability>,
    ) -> Result<Self, CoderError> {
        let prompts = PromptLibrary::load(&config.prompts)?;
        let retriever = Arc::new(ContextRetriever::new(search, &config.search));
        let completion = Arc::new(TextCompletion::new(completion, config.completion.timeout()));
        let generator = Arc::new(CodeGenerator::new(
            Arc::clone(&retriever),
            Arc::clone(&completion),
            &prompts,
            config.models.coder.clone(),
        )?);
        let executor = Arc::new(Executor::new(
            Arc::clone(&statements),
            config.warehouse.statement_timeout() + STATEMENT_TIMEOUT_GRACE,
        ));
        info!(session_id = %session_id, "Pipeline run ready");

        Ok(Self {
            config,
            session_id,
            prompts,
            retriever,
            completion,
            statements,
            generator,
            executor,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    pub async fn plan(
        &self,
        idea: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<Plan, CoderError> {
        let decomposer = PlanDecomposer::new(
            Arc::clone(&self.retriever),
            Arc::clone(&self.completion),
            &self.prompts,
            self.config.models.planner.clone(),
        )?;
        decomposer.decompose(idea, filter, limit).await
    }

    /// Run every step of an existing plan.
    pub async fn execute(
        &self,
        plan: &Plan,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<RunReport, CoderError> {
        let repair = RepairLoop::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.executor),
            self.config.repair.clone(),
            filter.clone(),
            limit,
        );
        Orchestrator::new(Arc::new(repair)).run(plan).await
    }

    /// Decompose the idea and run the resulting plan.
    pub async fn submit(
        &self,
        idea: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<(Plan, RunReport), CoderError> {
        let plan = self.plan(idea, filter, limit).await?;
        let report = self.execute(&plan, filter, limit).await?;
        Ok((plan, report))
    }

    pub async fn generate(
        &self,
        task: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<GeneratedCode, CoderError> {
        let code = self.generator.generate(task, filter, limit).await?;
        let statements = split_statements(&code);
        Ok(GeneratedCode { code, statements })
    }

    pub async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<String, CoderError> {
        self.retriever.render_context(query, filter, limit).await
    }

    pub async fn research(
        &self,
        idea: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<ResearchAnswer>, CoderError> {
        QuestionResearcher::new(
            Arc::clone(&self.retriever),
            Arc::clone(&self.completion),
            &self.prompts,
            self.config.models.research.clone(),
            self.config.search.key_column.clone(),
            self.config.search.value_column.clone(),
        )?
        .research(idea, filter)
        .await
    }

    /// Generate documents for `text`; with `store`, also persist them.
    /// Returns the documents and how many were stored.
    pub async fn document(
        &self,
        text: &str,
        store: bool,
    ) -> Result<(Vec<GeneratedDocument>, usize), CoderError> {
        let documentator = Documentator::new(
            Arc::clone(&self.statements),
            Arc::clone(&self.completion),
            &self.prompts,
            self.config.models.documenter.clone(),
            self.config.documentation.clone(),
        )?;
        let documents = documentator.generate(text).await?;
        let stored = if store {
            documentator.store(&documents).await?
        } else {
            0
        };
        Ok((documents, stored))
    }
}
