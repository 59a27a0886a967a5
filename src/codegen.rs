//! Code generation and statement splitting.

use crate::completion::{strip_code_fences, TextCompletion};
use crate::error::CoderError;
use crate::prompt::{PromptLibrary, PromptTemplate, CODE_TEMPLATE};
use crate::retrieval::{ContextRetriever, SearchFilter};
use std::sync::Arc;
use tracing::debug;

/// Asks the coder model for executable code for one task.
pub struct CodeGenerator {
    retriever: Arc<ContextRetriever>,
    completion: Arc<TextCompletion>,
    template: PromptTemplate,
    model: String,
}

impl CodeGenerator {
    pub fn new(
        retriever: Arc<ContextRetriever>,
        completion: Arc<TextCompletion>,
        prompts: &PromptLibrary,
        model: impl Into<String>,
    ) -> Result<Self, CoderError> {
        Ok(Self {
            retriever,
            completion,
            template: prompts.get(CODE_TEMPLATE)?.clone(),
            model: model.into(),
        })
    }

    /// Raw code block for `task_text`, fences removed and trimmed. Retrieval
    /// is scoped to the task text, not to the original idea.
    pub async fn generate(
        &self,
        task_text: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<String, CoderError> {
        let context = self.retriever.render_context(task_text, filter, limit).await?;
        let prompt = self
            .template
            .render(&[("context", &context), ("task", task_text)])?;
        let raw = self.completion.complete(&self.model, &prompt).await?;
        let code = strip_code_fences(&raw);
        debug!(code_chars = code.len(), "Code generated");
        Ok(code)
    }

    pub fn split_statements(code: &str) -> Vec<String> {
        split_statements(code)
    }
}

/// Split code on `;` terminators.
///
/// Terminators inside single-quoted literals, double-quoted identifiers,
/// `$$ ... $$` bodies and comments do not split. Fragments holding only
/// whitespace or comments are dropped; a non-empty fragment after the last
/// terminator is kept.
pub fn split_statements(code: &str) -> Vec<String> {
    let chars: Vec<char> = code.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' => {
                has_content = true;
                current.push(c);
                i += 1;
                while i < chars.len() {
                    let q = chars[i];
                    current.push(q);
                    i += 1;
                    if q == c {
                        // doubled quote is an escaped quote
                        if chars.get(i) == Some(&c) {
                            current.push(c);
                            i += 1;
                            continue;
                        }
                        break;
                    }
                    if q == '\\' && c == '\'' {
                        if let Some(&escaped) = chars.get(i) {
                            current.push(escaped);
                            i += 1;
                        }
                    }
                }
            }
            '$' if next == Some('$') => {
                has_content = true;
                current.push_str("$$");
                i += 2;
                while i < chars.len() {
                    if chars[i] == '$' && chars.get(i + 1) == Some(&'$') {
                        current.push_str("$$");
                        i += 2;
                        break;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                current.push_str("/*");
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        current.push_str("*/");
                        i += 2;
                        break;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
            }
            ';' => {
                if has_content {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_content = false;
                i += 1;
            }
            _ => {
                if !c.is_whitespace() {
                    has_content = true;
                }
                current.push(c);
                i += 1;
            }
        }
    }

    if has_content {
        statements.push(current.trim().to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SearchConfig;
    use crate::testing::{ScriptedCompletion, StaticSearch};
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn splits_on_terminators_and_drops_trailing_remainder() {
        let code = "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);\n";
        assert_eq!(
            split_statements(code),
            vec!["CREATE TABLE t (id INT)", "INSERT INTO t VALUES (1)"]
        );
    }

    #[test]
    fn keeps_unterminated_final_statement() {
        assert_eq!(
            split_statements("USE ROLE SYSADMIN; SELECT 1"),
            vec!["USE ROLE SYSADMIN", "SELECT 1"]
        );
    }

    #[test]
    fn terminators_inside_literals_do_not_split() {
        let code = "INSERT INTO t VALUES ('a;b', 'it''s; fine');\nSELECT \"odd;name\" FROM t;";
        assert_eq!(
            split_statements(code),
            vec![
                "INSERT INTO t VALUES ('a;b', 'it''s; fine')",
                "SELECT \"odd;name\" FROM t"
            ]
        );
    }

    #[test]
    fn procedure_bodies_stay_whole() {
        let code = "CREATE OR REPLACE PROCEDURE p()\n  RETURNS STRING\n  LANGUAGE PYTHON\n\
                    AS $$\ndef run(session):\n    session.sql('SELECT 1;').collect()\n    return 'ok'\n$$;\n\
                    CALL p();";
        let statements = split_statements(code);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("$$"));
        assert_eq!(statements[1], "CALL p()");
    }

    #[test]
    fn comment_only_fragments_are_dropped() {
        let code = "-- setup; nothing here\n/* block; comment */;\nSELECT 1; -- trailing";
        assert_eq!(split_statements(code), vec!["SELECT 1"]);
    }

    #[test]
    fn empty_and_whitespace_code_yield_no_statements() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("  ;\n ; ").is_empty());
    }

    proptest! {
        #[test]
        fn terminated_statements_split_back_in_order(
            bodies in prop::collection::vec("[A-Za-z_][A-Za-z0-9_ ]{0,20}", 1..8)
        ) {
            let statements: Vec<String> =
                bodies.iter().map(|b| format!("SELECT {}", b.trim())).collect();
            let code: String = statements.iter().map(|s| format!("{};\n", s)).collect();
            let split = split_statements(&code);
            prop_assert_eq!(split.len(), statements.len());
            prop_assert_eq!(split, statements);
        }
    }

    #[tokio::test]
    async fn generate_strips_fences_and_scopes_retrieval_to_task() {
        let search = Arc::new(StaticSearch::new(Vec::new()));
        let backend = Arc::new(ScriptedCompletion::new(vec![
            "```sql\nCREATE TABLE t (id INT);\n```".to_string(),
        ]));
        let generator = CodeGenerator::new(
            Arc::new(ContextRetriever::new(search.clone(), &SearchConfig::default())),
            Arc::new(TextCompletion::new(backend.clone(), Duration::from_secs(5))),
            &PromptLibrary::builtin(),
            "coder-model",
        )
        .unwrap();

        let code = generator
            .generate("Step: create t", &SearchFilter::empty(), None)
            .await
            .unwrap();
        assert_eq!(code, "CREATE TABLE t (id INT);");
        assert_eq!(CodeGenerator::split_statements(&code), vec!["CREATE TABLE t (id INT)"]);
        assert_eq!(search.calls()[0].query, "Step: create t");
        assert!(backend.prompts()[0].contains("Step: create t"));
    }
}
