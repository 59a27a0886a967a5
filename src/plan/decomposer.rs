use super::Plan;
use crate::completion::TextCompletion;
use crate::error::CoderError;
use crate::prompt::{PromptLibrary, PromptTemplate, PLAN_TEMPLATE};
use crate::retrieval::{ContextRetriever, SearchFilter};
use std::sync::Arc;
use tracing::{info, warn};

/// Turns a free-text idea into a typed [`Plan`].
pub struct PlanDecomposer {
    retriever: Arc<ContextRetriever>,
    completion: Arc<TextCompletion>,
    template: PromptTemplate,
    model: String,
}

impl PlanDecomposer {
    pub fn new(
        retriever: Arc<ContextRetriever>,
        completion: Arc<TextCompletion>,
        prompts: &PromptLibrary,
        model: impl Into<String>,
    ) -> Result<Self, CoderError> {
        Ok(Self {
            retriever,
            completion,
            template: prompts.get(PLAN_TEMPLATE)?.clone(),
            model: model.into(),
        })
    }

    /// Retrieve context for the idea, ask the planner model for the plan
    /// document and decode it strictly.
    pub async fn decompose(
        &self,
        idea: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<Plan, CoderError> {
        let context = self.retriever.render_context(idea, filter, limit).await?;
        let prompt = self
            .template
            .render(&[("context", &context), ("idea", idea)])?;
        let raw = self.completion.complete(&self.model, &prompt).await?;

        match Plan::from_yaml(&raw) {
            Ok(plan) => {
                info!(
                    steps = plan.len(),
                    code_steps = plan.code_step_count(),
                    model = %self.model,
                    "Plan decomposed"
                );
                Ok(plan)
            }
            Err(e) => {
                warn!(error = %e, response_chars = raw.len(), "Planner output rejected");
                Err(e)
            }
        }
    }
}
