//! Prompt templates with `{{placeholder}}` substitution.
//!
//! Built-in templates cover every pipeline stage; a configured directory may
//! override any of them with a file named after the template (`plan.txt`).

use crate::error::CoderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const PLAN_TEMPLATE: &str = "plan";
pub const CODE_TEMPLATE: &str = "code";
pub const QUESTIONS_TEMPLATE: &str = "questions";
pub const QUESTION_SUMMARY_TEMPLATE: &str = "question_summary";
pub const DOCUMENTATION_TEMPLATE: &str = "documentation";

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding `<template>.txt` overrides
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    text: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Single pass over the template: substituted values are never rescanned,
    /// so retrieved context containing braces is inserted verbatim.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, CoderError> {
        let lookup: HashMap<&str, &str> = vars.iter().copied().collect();
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let key = after[..end].trim();
            if is_placeholder_name(key) {
                let value = lookup.get(key).ok_or_else(|| {
                    CoderError::ConfigError(format!(
                        "Prompt template '{}' has no value for placeholder '{}'",
                        self.name, key
                    ))
                })?;
                out.push_str(value);
            } else {
                out.push_str(&rest[start..start + 2 + end + 2]);
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn is_placeholder_name(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolved templates for one run.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        let templates = [
            (PLAN_TEMPLATE, PLAN_PROMPT),
            (CODE_TEMPLATE, CODE_PROMPT),
            (QUESTIONS_TEMPLATE, QUESTIONS_PROMPT),
            (QUESTION_SUMMARY_TEMPLATE, QUESTION_SUMMARY_PROMPT),
            (DOCUMENTATION_TEMPLATE, DOCUMENTATION_PROMPT),
        ]
        .into_iter()
        .map(|(name, text)| (name.to_string(), PromptTemplate::new(name, text)))
        .collect();
        Self { templates }
    }

    /// Built-ins, replaced by `<dir>/<name>.txt` where present.
    pub fn load(config: &PromptsConfig) -> Result<Self, CoderError> {
        let mut library = Self::builtin();
        let Some(dir) = &config.dir else {
            return Ok(library);
        };
        if !dir.is_dir() {
            return Err(CoderError::ConfigError(format!(
                "Prompt directory not found: {}",
                dir.display()
            )));
        }
        for name in library.templates.keys().cloned().collect::<Vec<_>>() {
            let path = dir.join(format!("{}.txt", name));
            if path.exists() {
                let text = std::fs::read_to_string(&path)?;
                tracing::debug!(template = %name, path = %path.display(), "Prompt template overridden");
                library
                    .templates
                    .insert(name.clone(), PromptTemplate::new(name, text));
            }
        }
        Ok(library)
    }

    pub fn get(&self, name: &str) -> Result<&PromptTemplate, CoderError> {
        self.templates
            .get(name)
            .ok_or_else(|| CoderError::ConfigError(format!("Unknown prompt template '{}'", name)))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

const PLAN_PROMPT: &str = r#"You are an assistant responsible for transforming a user's idea about implementing functionality in Snowflake into a YAML formatted list of detailed and sequential steps.

Break the user's idea, which may include several implicit components, into a clear and complete plan. Each step covers one aspect of the work:
1. Problem definition and objective: the goal and requirements behind the step.
2. Design of the solution: architecture or logical approach, object names, relationships and structure.
3. Configuration and setup: warehouses, roles, security settings and schemas. State any prerequisite objects assumed to exist.
4. Code development: detailed instructions for creating or modifying objects (tables, views, stored procedures, etc.). Stored procedures take no parameters.
5. Validation and testing: how to test the step.
Every step carries a 'context' field listing prerequisite information, dependencies and existing objects, so each step can be executed on its own.

The output must be strictly valid YAML without any additional text, commentary or code outside the YAML structure.

YAML format to use:
steps:
  - step_name: <step name>
    step_type: <sql_code or documentation>
    long_step_description: <detailed description, including objectives, configuration, prerequisites and testing>
    objective: <objective of the step>
    context: <prerequisite information or existing objects relevant to this step>
    object:
      name: <name of the object to be created or modified>
      type: <object type: table, view, procedure, etc.>

Additional Context:
{{context}}

User's Idea:
{{idea}}
"#;

const CODE_PROMPT: &str = r#"You are an expert engineer in Snowflake, with extensive experience designing, implementing and optimizing data solutions on Snowflake. You master SQL and Snowpark (Python) for stored procedures and follow best practices in security, performance and maintainability. When the request includes errors from a previous attempt, analyze each error message and adjust the code so it runs successfully this time.

Additional Context:
{{context}}

User Request:
{{task}}

Generate SQL code that can be executed in Snowflake to fulfill the request. Terminate every statement with a semicolon. Stored procedures may use Snowpark (Python). Respond with the code only, without explanations or comments other than those required for valid SQL.

Example of a Snowpark stored procedure:
```sql
CREATE OR REPLACE PROCEDURE joblib_multiprocessing_proc(i INT)
  RETURNS STRING
  LANGUAGE PYTHON
  RUNTIME_VERSION = 3.9
  HANDLER = 'joblib_multiprocessing'
  PACKAGES = ('snowflake-snowpark-python', 'joblib')
AS $$
import joblib
from math import sqrt

def joblib_multiprocessing(session, i):
  result = joblib.Parallel(n_jobs=-1)(joblib.delayed(sqrt)(i ** 2) for i in range(10))
  return str(result)
$$;
```
"#;

const QUESTIONS_PROMPT: &str = r#"You help a data platform engineer refine an idea before it is implemented in Snowflake. Read the idea and list the initial questions that must be answered from the platform documentation before designing a solution (security, objects involved, limits, prerequisites).

Respond with strictly valid YAML and nothing else, in this format:
initials_questions:
  - title: <short title>
    question: <the question>

Idea:
{{idea}}
"#;

const QUESTION_SUMMARY_PROMPT: &str = r#"Answer the question using only the documentation excerpts below. Summarize the relevant facts in a few sentences; say so plainly if the excerpts do not answer it.

Question:
{{question}}

Documentation:
{{context}}
"#;

const DOCUMENTATION_PROMPT: &str = r#"You maintain the internal documentation of a Snowflake data platform. Turn the text below into one or more markdown documents. Do not duplicate documents that already exist; extend the catalogue instead.

Existing documents (category - name):
{{existing_docs}}

Respond with strictly valid YAML and nothing else, in this format:
generated_docs:
  - name: <document name>
    category: <category>
    markdown: |
      <markdown body>

Text to document:
{{text_to_document}}
"#;
