//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources replace scalar values and whole arrays; tables merge key by key.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("search.limit", 10)?
        .set_default("repair.max_attempts", 3)?
        .set_default("repair.error_history_attempts", 2)?
        .set_default("completion.mode", "bound")?
        .set_default("completion.backend", "warehouse")
}
