//! CLI Tooling
//!
//! Command-line interface over the builder and the consumer. Every command
//! runs against one workspace and returns its output as a string.

use crate::config::{ConfigLoader, IndexConfig};
use crate::consumer::IndexConsumer;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::tooling::format::{format_build_text, format_matches_text, format_rows_text};
use crate::tree::{DocumentNode, IndexBuilder, IndexWriter};
use crate::watch::{WatchConfig, WatchDaemon};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use tracing::info;

/// ctd-index - Metadata resolution and navigable index for document archives
#[derive(Parser)]
#[command(name = "ctd-index")]
#[command(about = "Build and browse the navigable index of a regulatory document archive")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging config with command-line flags applied over `base`.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk the document tree and write the index and its fragments
    Build {
        /// Partition threshold in bytes (overrides config)
        #[arg(long, conflicts_with = "no_partition")]
        threshold: Option<usize>,
        /// Write a single index without fragments
        #[arg(long)]
        no_partition: bool,
        /// Also write the markdown listing
        #[arg(long)]
        markdown: bool,
        /// Also write the flat file listing
        #[arg(long)]
        listing: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Search the loaded index
    Search {
        query: String,
        /// Fetch every fragment before searching
        #[arg(long)]
        load_all: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Load the folders leading to a node and print it
    Show { path: String },
    /// Print the visible rows after the given expansions and query
    Tree {
        /// Folder to expand (repeatable, applied in order)
        #[arg(long)]
        expand: Vec<String>,
        /// Search query applied after the expansions
        #[arg(long)]
        query: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Rebuild the index whenever the document tree changes
    Watch {
        /// Debounce window in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Batch window in milliseconds
        #[arg(long)]
        batch_window_ms: Option<u64>,
    },
}

/// CLI context for executing commands
pub struct CliContext {
    workspace_root: PathBuf,
    config: IndexConfig,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let workspace_root = dunce::canonicalize(&workspace_root).map_err(|e| {
            ApiError::ConfigError(format!(
                "Workspace {} is not accessible: {}",
                workspace_root.display(),
                e
            ))
        })?;
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path).map_err(|e| {
                ApiError::ConfigError(format!(
                    "Failed to load config from {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => ConfigLoader::load(&workspace_root)
                .map_err(|e| ApiError::ConfigError(format!("Failed to load config: {}", e)))?,
        };
        let config = config.resolved(&workspace_root)?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Build {
                threshold,
                no_partition,
                markdown,
                listing,
                format,
            } => self.handle_build(*threshold, *no_partition, *markdown, *listing, format),
            Commands::Search {
                query,
                load_all,
                format,
            } => self.block_on(self.handle_search(query, *load_all, format)),
            Commands::Show { path } => self.block_on(self.handle_show(path)),
            Commands::Tree {
                expand,
                query,
                format,
            } => self.block_on(self.handle_tree(expand, query.as_deref(), format)),
            Commands::Watch {
                debounce_ms,
                batch_window_ms,
            } => {
                let mut watch = WatchConfig::from_index_config(&self.config);
                if let Some(ms) = debounce_ms {
                    watch.debounce_ms = *ms;
                }
                if let Some(ms) = batch_window_ms {
                    watch.batch_window_ms = *ms;
                }
                let daemon = WatchDaemon::new(self.config.clone(), watch);
                info!("Starting watch mode daemon");
                daemon.start()?;
                Ok("Watch daemon stopped".to_string())
            }
        }
    }

    fn block_on<F>(&self, future: F) -> Result<String, ApiError>
    where
        F: Future<Output = Result<String, ApiError>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(future)
    }

    fn handle_build(
        &self,
        threshold: Option<usize>,
        no_partition: bool,
        markdown: bool,
        listing: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        let mut config = self.config.clone();
        if let Some(threshold) = threshold {
            config.partition.enabled = true;
            config.partition.threshold_bytes = threshold;
        }
        if no_partition {
            config.partition.enabled = false;
        }
        if markdown {
            config.output.markdown = true;
        }
        if listing {
            config.output.listing = true;
        }
        config.validate()?;

        let output = IndexBuilder::from_config(&config).build(&config.archive.documents_dir)?;
        let written = IndexWriter::from_config(&config).write(&output)?;

        match format {
            "json" => Ok(serde_json::to_string_pretty(&json!({
                "report": output.report,
                "written": written,
            }))?),
            _ => Ok(format_build_text(&output.report, &written)),
        }
    }

    async fn handle_search(
        &self,
        query: &str,
        load_all: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        let consumer = IndexConsumer::open(&self.config).await?;
        if load_all {
            consumer.load_all().await?;
        }
        let matches: Vec<DocumentNode> = consumer
            .search(query)
            .iter()
            .filter_map(|path| consumer.node(path))
            .map(without_children)
            .collect();

        match format {
            "json" => Ok(serde_json::to_string_pretty(&matches)?),
            _ => Ok(format_matches_text(query, &matches)),
        }
    }

    async fn handle_show(&self, path: &str) -> Result<String, ApiError> {
        let consumer = IndexConsumer::open(&self.config).await?;
        let node = consumer.reveal(path).await?;
        let child_count = node.loaded_children().len();
        let mut value = serde_json::to_value(without_children(node))?;
        if let Some(object) = value.as_object_mut() {
            object.insert("childCount".to_string(), json!(child_count));
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }

    async fn handle_tree(
        &self,
        expand: &[String],
        query: Option<&str>,
        format: &str,
    ) -> Result<String, ApiError> {
        let consumer = IndexConsumer::open(&self.config).await?;
        consumer.expand(&consumer.root_path()).await?;
        for path in expand {
            consumer.expand(path).await?;
        }
        if let Some(query) = query {
            consumer.search(query);
        }
        let rows = consumer.rows();
        match format {
            "json" => Ok(serde_json::to_string_pretty(&rows)?),
            _ => Ok(format_rows_text(&rows)),
        }
    }
}

/// Drop loaded children for display; stubs keep their `fragmentRef`.
fn without_children(mut node: DocumentNode) -> DocumentNode {
    node.children = None;
    node
}
