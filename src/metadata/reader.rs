//! Metadata store reader: pure lookup of the declarations at one folder level.

use super::{FolderMetadata, MetadataRecord, ALTERNATE_PREFIX, PRIMARY_METADATA_FILE};
use crate::error::MetadataError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Source of per-folder declarations
pub trait MetadataStore: Send + Sync {
    /// Read every declaration found directly in `folder`.
    ///
    /// A missing declaration file is not an error. A file that cannot be read
    /// or parsed is reported in `FolderMetadata::issues` and treated as
    /// absent; the remaining declaration file is still used.
    fn read_folder(&self, folder: &Path) -> FolderMetadata;

    /// Entry names the store owns; the builder excludes them from the tree.
    fn reserved_names(&self) -> Vec<String>;
}

/// Reads `metadata.json` and `__metadata.json` from disk
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    primary_name: String,
    alternate_name: String,
}

impl FsMetadataStore {
    pub fn new(primary_name: impl Into<String>, alternate_prefix: &str) -> Self {
        let primary_name = primary_name.into();
        let alternate_name = format!("{}{}", alternate_prefix, primary_name);
        Self {
            primary_name,
            alternate_name,
        }
    }

    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    pub fn alternate_name(&self) -> &str {
        &self.alternate_name
    }

    fn read_record(&self, path: PathBuf) -> Result<Option<MetadataRecord>, MetadataError> {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MetadataError::Unreadable { path, source: e }),
        };
        MetadataRecord::from_json(&bytes)
            .map(Some)
            .map_err(|e| MetadataError::Malformed {
                path,
                reason: e.to_string(),
            })
    }
}

impl Default for FsMetadataStore {
    fn default() -> Self {
        Self::new(PRIMARY_METADATA_FILE, ALTERNATE_PREFIX)
    }
}

impl MetadataStore for FsMetadataStore {
    fn read_folder(&self, folder: &Path) -> FolderMetadata {
        let mut metadata = FolderMetadata::default();
        match self.read_record(folder.join(&self.primary_name)) {
            Ok(record) => metadata.primary = record,
            Err(e) => metadata.issues.push(e),
        }
        match self.read_record(folder.join(&self.alternate_name)) {
            Ok(record) => metadata.alternate = record,
            Err(e) => metadata.issues.push(e),
        }
        metadata
    }

    fn reserved_names(&self) -> Vec<String> {
        vec![self.primary_name.clone(), self.alternate_name.clone()]
    }
}
