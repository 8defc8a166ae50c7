//! Configuration
//!
//! `IndexConfig` is assembled by `ConfigLoader` from serde defaults, the
//! global config file, the workspace config file, and `CTD_INDEX_*`
//! environment variables, in increasing precedence.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-workspace config file
pub const WORKSPACE_CONFIG_FILE: &str = "ctd-index.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "CTD_INDEX";

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IndexConfig {
    /// Resolve relative paths against `workspace_root` and validate.
    pub fn resolved(mut self, workspace_root: &Path) -> Result<IndexConfig, ApiError> {
        self.archive.documents_dir = resolve(workspace_root, &self.archive.documents_dir);
        self.output.output_dir = resolve(workspace_root, &self.output.output_dir);
        if let Some(file) = &self.logging.file {
            self.logging.file = Some(resolve(workspace_root, file));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let invalid = |msg: &str| Err(ApiError::ConfigError(msg.to_string()));

        if self.archive.root_path.trim_matches('/').is_empty() {
            return invalid("archive.root_path must not be empty");
        }
        for (key, name) in [
            ("archive.metadata_file", &self.archive.metadata_file),
            ("output.index_file", &self.output.index_file),
            ("output.fragment_file", &self.output.fragment_file),
            ("output.markdown_file", &self.output.markdown_file),
            ("output.listing_file", &self.output.listing_file),
        ] {
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                return Err(ApiError::ConfigError(format!(
                    "{} must be a plain file name, got {:?}",
                    key, name
                )));
            }
        }
        if self.archive.alternate_prefix.is_empty() {
            return invalid("archive.alternate_prefix must not be empty");
        }
        if self.partition.enabled && self.partition.threshold_bytes == 0 {
            return invalid("partition.threshold_bytes must be greater than zero");
        }
        if self.fetch.timeout_ms == 0 {
            return invalid("fetch.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

fn resolve(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("documents")
}

fn default_root_path() -> String {
    "documents".to_string()
}

fn default_metadata_file() -> String {
    crate::metadata::PRIMARY_METADATA_FILE.to_string()
}

fn default_alternate_prefix() -> String {
    crate::metadata::ALTERNATE_PREFIX.to_string()
}

fn default_skip_names() -> Vec<String> {
    [
        ".gitignore",
        ".gitkeep",
        "index.json",
        "index.md",
        "index-full.json",
        "index-full.md",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Where the document tree lives and how it is read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory holding the document tree (relative to the workspace root)
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Path identifier of the root node, e.g. `documents`
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Primary declaration file name
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Prefix of the alternate declaration file name
    #[serde(default = "default_alternate_prefix")]
    pub alternate_prefix: String,

    /// Additional entry names excluded from the tree
    #[serde(default = "default_skip_names")]
    pub skip_names: Vec<String>,

    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            root_path: default_root_path(),
            metadata_file: default_metadata_file(),
            alternate_prefix: default_alternate_prefix(),
            skip_names: default_skip_names(),
            include_hidden: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_toc_file() -> String {
    "toc.json".to_string()
}

fn default_markdown_file() -> String {
    "toc.md".to_string()
}

fn default_listing_file() -> String {
    "files.json".to_string()
}

fn default_true() -> bool {
    true
}

/// Output documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the index and fragment paths are relative to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_toc_file")]
    pub index_file: String,

    /// File name of each fragment document inside `<output_dir>/<ref>/`
    #[serde(default = "default_toc_file")]
    pub fragment_file: String,

    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Also write a markdown listing
    #[serde(default)]
    pub markdown: bool,

    #[serde(default = "default_markdown_file")]
    pub markdown_file: String,

    /// Also write the flat listing of every file
    #[serde(default)]
    pub listing: bool,

    #[serde(default = "default_listing_file")]
    pub listing_file: String,

    /// Link base for markdown and listing entries
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            index_file: default_toc_file(),
            fragment_file: default_toc_file(),
            pretty: true,
            markdown: false,
            markdown_file: default_markdown_file(),
            listing: false,
            listing_file: default_listing_file(),
            base_url: None,
        }
    }
}

fn default_threshold_bytes() -> usize {
    256 * 1024
}

/// Fragment partitioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Compact JSON size above which a folder is stored as a fragment
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: usize,
}

impl PartitionConfig {
    /// Effective threshold, `None` when partitioning is off.
    pub fn threshold(&self) -> Option<usize> {
        self.enabled.then_some(self.threshold_bytes)
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: default_threshold_bytes(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Fragment fetching for the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Fetch fragments over HTTP from here instead of the output directory
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_batch_window_ms() -> u64 {
    1_000
}

/// Rebuild-on-change timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Quiet period after the last event before a rebuild starts
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Longest a batch may keep growing before it is flushed
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            batch_window_ms: default_batch_window_ms(),
        }
    }
}
