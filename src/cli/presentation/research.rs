//! Research and documentation presentation.

use super::shared::to_pretty_json;
use crate::documentation::GeneratedDocument;
use crate::error::CoderError;
use crate::research::ResearchAnswer;
use owo_colors::OwoColorize;

pub fn format_research_text(answers: &[ResearchAnswer]) -> String {
    if answers.is_empty() {
        return "No questions were generated.".to_string();
    }
    answers
        .iter()
        .enumerate()
        .map(|(i, answer)| {
            format!(
                "{}\nQ: {}\n{}",
                format!("{}. {}", i + 1, answer.title).bold(),
                answer.question,
                answer.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_research_json(answers: &[ResearchAnswer]) -> Result<String, CoderError> {
    to_pretty_json(answers)
}

pub fn format_documents_text(documents: &[GeneratedDocument], stored: usize) -> String {
    let mut output = String::new();
    for document in documents {
        output.push_str(&format!(
            "{}\n{}\n\n",
            format!("{} - {}", document.category, document.name).bold().underline(),
            document.markdown.trim_end()
        ));
    }
    output.push_str(&format!(
        "{} documents generated, {} stored",
        documents.len(),
        stored
    ));
    output
}

pub fn format_documents_json(
    documents: &[GeneratedDocument],
    stored: usize,
) -> Result<String, CoderError> {
    to_pretty_json(&serde_json::json!({
        "documents": documents,
        "stored": stored,
    }))
}
