//! Shared presentation: generated code, configuration checks, JSON helper.

use crate::config::{CoderConfig, ValidationError};
use crate::error::CoderError;
use crate::pipeline::GeneratedCode;
use serde::Serialize;

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CoderError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CoderError::ConfigError(format!("Failed to render JSON: {}", e)))
}

pub fn format_generated_code(generated: &GeneratedCode) -> String {
    let mut output = String::new();
    for (i, statement) in generated.statements.iter().enumerate() {
        output.push_str(&format!("-- statement {}\n{};\n\n", i + 1, statement));
    }
    output.push_str(&format!("-- {} statements", generated.statements.len()));
    output
}

pub fn format_config_validation(
    config: &CoderConfig,
    result: &Result<(), Vec<ValidationError>>,
) -> String {
    match result {
        Ok(()) => format!(
            "Configuration is valid:\n  Account: {}\n  Search service: {}.{}.{}\n  Completion backend: {:?}\n  Max attempts: {}",
            config.warehouse.account_url,
            config.search.database,
            config.search.schema,
            config.search.service,
            config.completion.backend,
            config.repair.max_attempts
        ),
        Err(errors) => {
            let mut s = format!("Configuration has {} problem(s):", errors.len());
            for e in errors {
                s.push_str(&format!("\n  - {}", e));
            }
            s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_re_terminated() {
        let generated = GeneratedCode {
            code: "CREATE TABLE T (id INT);SELECT 1;".to_string(),
            statements: vec!["CREATE TABLE T (id INT)".to_string(), "SELECT 1".to_string()],
        };
        let text = format_generated_code(&generated);
        assert!(text.contains("CREATE TABLE T (id INT);\n"));
        assert!(text.ends_with("-- 2 statements"));
    }

    #[test]
    fn validation_lists_each_problem() {
        let config = CoderConfig::default();
        let result = config.validate();
        let text = format_config_validation(&config, &result);
        assert!(text.starts_with("Configuration has"));
        assert!(text.contains("Warehouse:"));
    }
}
