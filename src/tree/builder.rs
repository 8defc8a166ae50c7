//! Index builder
//!
//! Walks the document tree depth-first, resolves metadata for every entry,
//! and assembles the nested index. Large folders are split out into
//! fragments as the walk unwinds, so fragment stubs nest naturally.
//!
//! Non-fatal problems (malformed declarations, unreadable entries) are
//! collected into the `BuildReport`; only a cycle aborts the build.

use super::node::DocumentNode;
use super::ordering::sort_by_name;
use super::partition::Partitioner;
use super::walker::{list_dir, AncestorStack, DirIdentity, EntryType, ListingIssue, WalkerConfig};
use crate::config::IndexConfig;
use crate::error::{ApiError, MetadataError};
use crate::metadata::{FsMetadataStore, InheritedContext, MetadataResolver, MetadataStore};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Non-fatal build diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    #[error("malformed metadata for {folder} ({file}): {reason}")]
    MalformedMetadata {
        folder: String,
        file: PathBuf,
        reason: String,
    },
    #[error("unreadable entry {path}: {reason}")]
    UnreadableEntry { path: PathBuf, reason: String },
}

impl BuildWarning {
    fn from_metadata_error(folder: &str, err: MetadataError) -> BuildWarning {
        match err {
            MetadataError::Malformed { path, reason } => BuildWarning::MalformedMetadata {
                folder: folder.to_string(),
                file: path,
                reason,
            },
            MetadataError::Unreadable { path, source } => BuildWarning::UnreadableEntry {
                path,
                reason: source.to_string(),
            },
        }
    }
}

/// Summary of one build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub folders: usize,
    pub files: usize,
    pub fragments: usize,
    pub symlinks_skipped: usize,
    pub warnings: Vec<BuildWarning>,
    pub duration_ms: u64,
}

impl BuildReport {
    fn warn(&mut self, warning: BuildWarning) {
        warn!(warning = %warning, "Build warning");
        self.warnings.push(warning);
    }
}

/// Everything one build produces
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Top-level index; partitioned folders appear as stubs
    pub index: DocumentNode,
    /// Separately stored subtrees, sorted by path
    pub fragments: Vec<DocumentNode>,
    pub report: BuildReport,
}

/// Builder configuration
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Path identifier of the root node
    pub root_path: String,
    /// Compact JSON size above which a folder becomes a fragment
    pub partition_threshold: Option<usize>,
    pub walker: WalkerConfig,
}

impl BuilderConfig {
    pub fn from_index_config(config: &IndexConfig) -> BuilderConfig {
        let mut skip_names: std::collections::BTreeSet<String> =
            config.archive.skip_names.iter().cloned().collect();
        skip_names.insert(config.output.index_file.clone());
        skip_names.insert(config.output.fragment_file.clone());
        skip_names.insert(config.output.markdown_file.clone());
        skip_names.insert(config.output.listing_file.clone());
        BuilderConfig {
            root_path: config.archive.root_path.clone(),
            partition_threshold: config.partition.threshold(),
            walker: WalkerConfig {
                skip_names,
                include_hidden: config.archive.include_hidden,
            },
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self::from_index_config(&IndexConfig::default())
    }
}

/// Maps a directory to the identity used for cycle detection
pub type IdentityFn = fn(&Path) -> io::Result<DirIdentity>;

struct BuildState {
    report: BuildReport,
    ancestors: AncestorStack,
    partitioner: Partitioner,
}

/// Builds the index for one document tree
pub struct IndexBuilder<S: MetadataStore = FsMetadataStore> {
    config: BuilderConfig,
    store: S,
    identify: IdentityFn,
}

impl IndexBuilder<FsMetadataStore> {
    /// Builder reading declarations from disk with the configured names.
    pub fn from_config(config: &IndexConfig) -> Self {
        let store = FsMetadataStore::new(
            config.archive.metadata_file.clone(),
            &config.archive.alternate_prefix,
        );
        Self::new(BuilderConfig::from_index_config(config), store)
    }
}

impl<S: MetadataStore> IndexBuilder<S> {
    pub fn new(mut config: BuilderConfig, store: S) -> Self {
        config.walker.skip_names.extend(store.reserved_names());
        Self {
            config,
            store,
            identify: DirIdentity::of,
        }
    }

    /// Replace how directories are identified when checking for cycles.
    pub fn with_identity(mut self, identify: IdentityFn) -> Self {
        self.identify = identify;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build the index for the tree rooted at `documents_dir`.
    pub fn build(&self, documents_dir: &Path) -> Result<BuildOutput, ApiError> {
        let start = Instant::now();
        let root_path = self.config.root_path.trim_matches('/').to_string();
        if root_path.is_empty() {
            return Err(ApiError::ConfigError("root path must not be empty".to_string()));
        }
        let root_name = root_path
            .rsplit('/')
            .next()
            .unwrap_or(root_path.as_str())
            .to_string();

        info!(documents_dir = %documents_dir.display(), root = %root_path, "Building index");

        let mut state = BuildState {
            report: BuildReport::default(),
            ancestors: AncestorStack::new(),
            partitioner: Partitioner::new(self.config.partition_threshold),
        };

        let index = self
            .build_folder(
                &mut state,
                documents_dir,
                &root_name,
                &root_path,
                &InheritedContext::default(),
                true,
            )?
            .ok_or_else(|| ApiError::RootUnavailable(documents_dir.to_path_buf()))?;

        let fragments = state.partitioner.into_fragments();
        let mut report = state.report;
        report.fragments = fragments.len();
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            folders = report.folders,
            files = report.files,
            fragments = report.fragments,
            warnings = report.warnings.len(),
            duration_ms = report.duration_ms,
            "Index build completed"
        );

        Ok(BuildOutput {
            index,
            fragments,
            report,
        })
    }

    fn build_folder(
        &self,
        state: &mut BuildState,
        dir: &Path,
        name: &str,
        path: &str,
        parent: &InheritedContext,
        is_root: bool,
    ) -> Result<Option<DocumentNode>, ApiError> {
        let identity = match (self.identify)(dir) {
            Ok(identity) => identity,
            Err(e) if is_root => {
                warn!(path = %dir.display(), error = %e, "Document root unavailable");
                return Err(ApiError::RootUnavailable(dir.to_path_buf()));
            }
            Err(e) => {
                state.report.warn(BuildWarning::UnreadableEntry {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };
        if !state.ancestors.enter(identity) {
            return Err(ApiError::CyclicStructure(path.to_string()));
        }
        let result = self.build_entered_folder(state, dir, name, path, parent, is_root);
        state.ancestors.leave();
        result
    }

    fn build_entered_folder(
        &self,
        state: &mut BuildState,
        dir: &Path,
        name: &str,
        path: &str,
        parent: &InheritedContext,
        is_root: bool,
    ) -> Result<Option<DocumentNode>, ApiError> {
        let listing = match list_dir(dir, &self.config.walker) {
            Ok(listing) => listing,
            Err(e) if is_root => {
                warn!(path = %dir.display(), error = %e, "Document root unreadable");
                return Err(ApiError::RootUnavailable(dir.to_path_buf()));
            }
            Err(e) => {
                state.report.warn(BuildWarning::UnreadableEntry {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };

        for issue in listing.issues {
            match issue {
                ListingIssue::Unreadable { path, reason } => {
                    state.report.warn(BuildWarning::UnreadableEntry { path, reason })
                }
                ListingIssue::SymlinkSkipped { path } => {
                    debug!(path = %path.display(), "Skipping symbolic link");
                    state.report.symlinks_skipped += 1;
                }
            }
        }

        let mut metadata = self.store.read_folder(dir);
        for issue in metadata.issues.drain(..) {
            state.report.warn(BuildWarning::from_metadata_error(path, issue));
        }

        let declaration = metadata.folder_declaration();
        let resolved = MetadataResolver::resolve_folder(name, &declaration, parent);
        let context = parent.descend(&declaration);

        let mut entries = listing.entries;
        sort_by_name(&mut entries, declaration.order.as_deref(), |e| e.name.as_str());

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            let child_path = format!("{}/{}", path, entry.name);
            match entry.entry_type {
                EntryType::Directory => {
                    if let Some(child) = self.build_folder(
                        state,
                        &entry.path,
                        &entry.name,
                        &child_path,
                        &context,
                        false,
                    )? {
                        children.push(child);
                    }
                }
                EntryType::File => {
                    let file_declaration = metadata.file_declaration(&entry.name);
                    let resolved =
                        MetadataResolver::resolve_file(&entry.name, &file_declaration, &context);
                    state.report.files += 1;
                    children.push(DocumentNode::file(entry.name, child_path, resolved));
                }
            }
        }

        state.report.folders += 1;
        let node = DocumentNode::folder(name, path, resolved, children);
        if is_root {
            Ok(Some(node))
        } else {
            Ok(Some(state.partitioner.place(node)?))
        }
    }
}
