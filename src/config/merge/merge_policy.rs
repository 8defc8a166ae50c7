//! Merge policy: how layered sources combine.
//!
//! Defaults come from serde, not from a seeded source, so a list set in a
//! higher layer replaces the default list instead of being merged into it.
//! Tables merge key by key; scalars and lists in later sources replace
//! earlier ones.

use crate::config::IndexConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Keys whose environment values are comma-separated lists
pub const LIST_KEYS: &[&str] = &["archive.skip_names"];

/// Empty builder; sources are layered on in precedence order.
pub fn base_builder() -> ConfigBuilder<DefaultState> {
    Config::builder()
}

/// Build the layered sources and deserialize, filling gaps from serde defaults.
pub fn finish(builder: ConfigBuilder<DefaultState>) -> Result<IndexConfig, ConfigError> {
    builder.build()?.try_deserialize()
}
