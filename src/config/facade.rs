//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::IndexConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, the workspace file, and environment.
    pub fn load(workspace_root: &Path) -> Result<IndexConfig, ConfigError> {
        MergeService::load(workspace_root)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<IndexConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Create default configuration.
    pub fn default() -> IndexConfig {
        IndexConfig::default()
    }
}
