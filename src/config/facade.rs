//! Config loader facade: the only place that knows source order.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::CoderConfig;
use crate::error::CoderError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace: defaults, global file, workspace
    /// files, then environment overrides.
    pub fn load(workspace_root: &Path) -> Result<CoderConfig, CoderError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: CoderConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from one explicit file on top of the defaults.
    /// Other files and environment overrides are not consulted.
    pub fn load_from_file(path: &Path) -> Result<CoderConfig, CoderError> {
        if !path.exists() {
            return Err(CoderError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config: CoderConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Path of the per-user configuration file, if a home directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
