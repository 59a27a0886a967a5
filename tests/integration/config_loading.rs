//! Integration tests for configuration source precedence

use super::test_utils::with_xdg_env;
use tempfile::TempDir;
use warehouse_coder::config::ConfigLoader;
use warehouse_coder::repair::EmptyCodePolicy;

#[test]
fn workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    with_xdg_env(&test_dir, || {
        let global_path = ConfigLoader::global_config_path().unwrap();
        assert!(global_path.starts_with(test_dir.path()));
        std::fs::create_dir_all(global_path.parent().unwrap()).unwrap();
        std::fs::write(
            &global_path,
            r#"
[warehouse]
account_url = "https://global.example.com"
token = "global-token"

[models]
coder = "global-coder"
planner = "global-planner"
"#,
        )
        .unwrap();

        let config_dir = workspace.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[models]
coder = "workspace-coder"

[repair]
empty_code = "retry"
context_char_budget = 0
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.warehouse.account_url, "https://global.example.com");
        assert_eq!(config.models.coder, "workspace-coder");
        assert_eq!(config.models.planner, "global-planner");
        assert_eq!(config.repair.empty_code, EmptyCodePolicy::Retry);
        assert_eq!(config.repair.context_char_budget, 0);
        assert_eq!(config.repair.max_attempts, 3);
        assert!(config.validate().is_ok());
    });
}

#[test]
fn explicit_file_must_exist() {
    let test_dir = TempDir::new().unwrap();
    let missing = test_dir.path().join("missing.toml");
    assert!(ConfigLoader::load_from_file(&missing).is_err());
}

#[test]
fn malformed_workspace_file_is_a_config_error() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    with_xdg_env(&test_dir, || {
        let config_dir = workspace.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "[repair]\nmax_attempts = \"many\"\n")
            .unwrap();
        assert!(ConfigLoader::load(workspace.path()).is_err());
    });
}
