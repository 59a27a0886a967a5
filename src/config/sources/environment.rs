//! Environment source: WHCODER_<SECTION>__<KEY>, e.g. WHCODER_REPAIR__MAX_ATTEMPTS=5

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "WHCODER";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("search.columns")
            .try_parsing(true),
    )
}
