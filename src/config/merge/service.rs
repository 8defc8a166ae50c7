//! MergeService: orchestrates sources, applies merge policy, deserializes to IndexConfig.

use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::IndexConfig;
use config::{ConfigError, File, FileFormat};
use std::path::Path;
use tracing::debug;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from workspace and standard sources.
    /// Precedence: global file (lowest) -> workspace file -> environment (highest).
    pub fn load(workspace_root: &Path) -> Result<IndexConfig, ConfigError> {
        let builder = merge_policy::base_builder();
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder)?;

        let config = merge_policy::finish(builder)?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<IndexConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let builder = merge_policy::base_builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true));
        let builder = environment::add_to_builder(builder)?;

        let config = merge_policy::finish(builder)?;
        debug!(file = %path.display(), "Configuration loaded from file");
        Ok(config)
    }
}
