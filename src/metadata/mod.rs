//! Metadata declarations and resolved records
//!
//! Each folder may carry a primary declaration file (`metadata.json`) and an
//! alternate one (`__metadata.json`) for folders whose primary name collides
//! with source content. A declaration maps `_folder` to the folder's own
//! properties and every other key (a literal filename) to that file's
//! properties. Accession folders use a flat header instead (`accession`,
//! `title`, `description`, `drug`, `license` at the top level), which is folded
//! into the folder declaration. Declarations are validated into typed records
//! as soon as they are read; everything downstream works with `ResolvedMetadata`.

pub mod dates;
pub mod reader;
pub mod resolver;

pub use reader::{FsMetadataStore, MetadataStore};
pub use resolver::{InheritedContext, MetadataResolver};

use crate::error::MetadataError;
use crate::text::non_empty;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Primary declaration file name
pub const PRIMARY_METADATA_FILE: &str = "metadata.json";

/// Reserved prefix marking the alternate declaration file
pub const ALTERNATE_PREFIX: &str = "__";

/// Key holding the folder-level declaration
pub const FOLDER_KEY: &str = "_folder";

/// Top-level key marking an accession-level declaration
pub const ACCESSION_KEY: &str = "accession";

const ACCESSION_HEADER_KEYS: [&str; 6] = [
    ACCESSION_KEY,
    "title",
    "description",
    "drug",
    "drugName",
    "license",
];

/// License attached to an accession, either a bare name or name plus link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum License {
    Name(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

/// Properties a folder declares about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Explicit child ordering override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl FolderDeclaration {
    /// Field-by-field merge: values set on `self` win, unset fields fall
    /// through to `fallback`.
    pub fn or(self, fallback: FolderDeclaration) -> FolderDeclaration {
        FolderDeclaration {
            title: self.title.or(fallback.title),
            summary: self.summary.or(fallback.summary),
            drug: self.drug.or(fallback.drug),
            source: self.source.or(fallback.source),
            order: self.order.or(fallback.order),
            accession: self.accession.or(fallback.accession),
            license: self.license.or(fallback.license),
        }
    }

    fn normalized(self) -> FolderDeclaration {
        FolderDeclaration {
            title: non_empty(self.title),
            summary: non_empty(self.summary),
            drug: non_empty(self.drug),
            source: non_empty(self.source),
            order: self.order.map(|names| {
                names
                    .into_iter()
                    .filter_map(|n| non_empty(Some(n)))
                    .collect()
            }),
            accession: non_empty(self.accession),
            license: self.license,
        }
    }
}

/// Flat header of an accession-level declaration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessionHeader {
    accession: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    drug: Option<String>,
    #[serde(default)]
    drug_name: Option<String>,
    #[serde(default)]
    license: Option<License>,
}

impl AccessionHeader {
    fn into_declaration(self) -> FolderDeclaration {
        FolderDeclaration {
            title: self.title,
            summary: self.description,
            drug: self.drug.or(self.drug_name),
            accession: Some(self.accession),
            license: self.license,
            ..Default::default()
        }
    }
}

/// Properties declared for one file, keyed by filename in its folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctd_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctd_title: Option<String>,
}

impl FileDeclaration {
    /// Field-by-field merge, `self` wins.
    pub fn or(self, fallback: FileDeclaration) -> FileDeclaration {
        FileDeclaration {
            title: self.title.or(fallback.title),
            summary: self.summary.or(fallback.summary),
            date: self.date.or(fallback.date),
            tags: self.tags.or(fallback.tags),
            ctd_module: self.ctd_module.or(fallback.ctd_module),
            ctd_title: self.ctd_title.or(fallback.ctd_title),
        }
    }

    fn normalized(self) -> FileDeclaration {
        FileDeclaration {
            title: non_empty(self.title),
            summary: non_empty(self.summary),
            date: non_empty(self.date),
            tags: self.tags.map(|tags| {
                tags.into_iter()
                    .filter_map(|t| non_empty(Some(t)))
                    .collect()
            }),
            ctd_module: non_empty(self.ctd_module),
            ctd_title: non_empty(self.ctd_title),
        }
    }
}

/// One parsed declaration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "_folder", default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderDeclaration>,
    #[serde(flatten)]
    pub files: BTreeMap<String, FileDeclaration>,
}

impl MetadataRecord {
    /// Parse and normalize a declaration document.
    ///
    /// A document with a top-level `accession` key is an accession header:
    /// its header keys become the folder declaration (taking precedence over
    /// any `_folder` entry) and the remaining keys are file entries.
    pub fn from_json(bytes: &[u8]) -> Result<MetadataRecord, serde_json::Error> {
        let mut document: Map<String, Value> = serde_json::from_slice(bytes)?;
        let header = if document.contains_key(ACCESSION_KEY) {
            let fields: Map<String, Value> = ACCESSION_HEADER_KEYS
                .iter()
                .filter_map(|key| document.remove_entry(*key))
                .collect();
            Some(serde_json::from_value::<AccessionHeader>(Value::Object(fields))?)
        } else {
            None
        };

        let mut record: MetadataRecord = serde_json::from_value(Value::Object(document))?;
        if let Some(header) = header {
            let declared = header.into_declaration();
            record.folder = Some(match record.folder.take() {
                Some(folder) => declared.or(folder),
                None => declared,
            });
        }
        Ok(record.normalized())
    }

    fn normalized(self) -> MetadataRecord {
        MetadataRecord {
            folder: self.folder.map(FolderDeclaration::normalized),
            files: self
                .files
                .into_iter()
                .map(|(name, decl)| (name, decl.normalized()))
                .collect(),
        }
    }
}

/// Declarations found at one folder level
///
/// A declaration file that could not be read or parsed is left out and its
/// failure kept in `issues`; the other file still counts.
#[derive(Debug, Default)]
pub struct FolderMetadata {
    pub primary: Option<MetadataRecord>,
    pub alternate: Option<MetadataRecord>,
    pub issues: Vec<MetadataError>,
}

impl FolderMetadata {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.alternate.is_none()
    }

    /// The folder's `_folder` declaration, primary over alternate per field.
    pub fn folder_declaration(&self) -> FolderDeclaration {
        let primary = self
            .primary
            .as_ref()
            .and_then(|r| r.folder.clone())
            .unwrap_or_default();
        let alternate = self
            .alternate
            .as_ref()
            .and_then(|r| r.folder.clone())
            .unwrap_or_default();
        primary.or(alternate)
    }

    /// The declaration for a file in this folder, primary over alternate per field.
    pub fn file_declaration(&self, file_name: &str) -> FileDeclaration {
        let lookup = |record: &Option<MetadataRecord>| {
            record
                .as_ref()
                .and_then(|r| r.files.get(file_name).cloned())
                .unwrap_or_default()
        };
        lookup(&self.primary).or(lookup(&self.alternate))
    }
}

/// Fully merged metadata attached to one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctd_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctd_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}
