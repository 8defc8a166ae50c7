//! Global config file: `$XDG_CONFIG_HOME/ctd-index/config.toml`

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::PathBuf;

/// Location of the global config file, if a config home can be determined.
pub fn path() -> Option<PathBuf> {
    xdg_root::config_home()
        .ok()
        .map(|home| home.join("ctd-index").join("config.toml"))
}

/// Add the global file when it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match path() {
        Some(path) if path.is_file() => {
            Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
        }
        _ => Ok(builder),
    }
}
