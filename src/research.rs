//! Question research: clarifying questions for an idea, each answered from
//! retrieved documentation.

use crate::completion::{strip_code_fences, TextCompletion};
use crate::error::CoderError;
use crate::prompt::{PromptLibrary, PromptTemplate, QUESTIONS_TEMPLATE, QUESTION_SUMMARY_TEMPLATE};
use crate::retrieval::{ContextRetriever, RetrievedDocument, SearchFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Documents retrieved per question.
pub const RESEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuestion {
    pub title: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchAnswer {
    pub title: String,
    pub question: String,
    pub summary: String,
}

#[derive(Deserialize)]
struct QuestionsDocument {
    initials_questions: Vec<ResearchQuestion>,
}

pub struct QuestionResearcher {
    retriever: Arc<ContextRetriever>,
    completion: Arc<TextCompletion>,
    questions: PromptTemplate,
    summary: PromptTemplate,
    model: String,
    key_column: String,
    value_column: String,
}

impl QuestionResearcher {
    pub fn new(
        retriever: Arc<ContextRetriever>,
        completion: Arc<TextCompletion>,
        prompts: &PromptLibrary,
        model: impl Into<String>,
        key_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Result<Self, CoderError> {
        Ok(Self {
            retriever,
            completion,
            questions: prompts.get(QUESTIONS_TEMPLATE)?.clone(),
            summary: prompts.get(QUESTION_SUMMARY_TEMPLATE)?.clone(),
            model: model.into(),
            key_column: key_column.into(),
            value_column: value_column.into(),
        })
    }

    pub async fn questions(&self, idea: &str) -> Result<Vec<ResearchQuestion>, CoderError> {
        let prompt = self.questions.render(&[("idea", idea)])?;
        let raw = self.completion.complete(&self.model, &prompt).await?;
        parse_questions(&raw)
    }

    /// Questions in model order, each with its summarized answer.
    pub async fn research(
        &self,
        idea: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<ResearchAnswer>, CoderError> {
        let questions = self.questions(idea).await?;
        info!(questions = questions.len(), "Research questions generated");

        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            let documents = self
                .retriever
                .search(&question.question, filter, Some(RESEARCH_LIMIT))
                .await?;
            let context = self.render_excerpts(&documents);
            let prompt = self.summary.render(&[
                ("question", question.question.as_str()),
                ("context", context.as_str()),
            ])?;
            let summary = self.completion.complete(&self.model, &prompt).await?;
            debug!(title = %question.title, documents = documents.len(), "Question summarized");
            answers.push(ResearchAnswer {
                title: question.title,
                question: question.question,
                summary: summary.trim().to_string(),
            });
        }
        Ok(answers)
    }

    /// `<key> - <part>` header followed by the excerpt text.
    fn render_excerpts(&self, documents: &[RetrievedDocument]) -> String {
        documents
            .iter()
            .map(|doc| {
                let key = doc.field_text(&self.key_column);
                let part = doc.field_text("PART");
                let header = if part.is_empty() {
                    key
                } else {
                    format!("{} - {}", key, part)
                };
                format!("{}\n{}", header, doc.field_text(&self.value_column))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn parse_questions(raw: &str) -> Result<Vec<ResearchQuestion>, CoderError> {
    let document: QuestionsDocument = serde_yaml::from_str(&strip_code_fences(raw))
        .map_err(|e| CoderError::PlanParse(format!("Invalid questions document: {}", e)))?;
    Ok(document.initials_questions)
}
