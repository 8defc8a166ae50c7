//! Metadata resolution
//!
//! Only `drug` and `accession` cross folder boundaries, and only through an
//! explicit nearest-ancestor lookup carried in `InheritedContext`. Every other
//! field comes from the node's own declaration or falls back to its default.

use super::dates::normalize_date;
use super::{FileDeclaration, FolderDeclaration, ResolvedMetadata};

/// Values a folder hands down to everything beneath it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritedContext {
    /// Nearest `drug` declared on this folder or an ancestor
    pub drug: Option<String>,
    /// Nearest accession number declared on this folder or an ancestor
    pub accession: Option<String>,
}

impl InheritedContext {
    /// Context for the children of a folder with the given declaration.
    pub fn descend(&self, folder: &FolderDeclaration) -> InheritedContext {
        InheritedContext {
            drug: folder.drug.clone().or_else(|| self.drug.clone()),
            accession: folder
                .accession
                .clone()
                .or_else(|| self.accession.clone()),
        }
    }
}

/// Resolves declarations into `ResolvedMetadata`
pub struct MetadataResolver;

impl MetadataResolver {
    /// Resolve a folder node. `parent` is the context inherited from the
    /// folder's parent (empty for the root).
    pub fn resolve_folder(
        name: &str,
        declaration: &FolderDeclaration,
        parent: &InheritedContext,
    ) -> ResolvedMetadata {
        let inherited = parent.descend(declaration);
        ResolvedMetadata {
            title: declaration
                .title
                .clone()
                .unwrap_or_else(|| name.to_string()),
            summary: declaration.summary.clone(),
            tags: Vec::new(),
            date: None,
            drug: inherited.drug,
            ctd_module: None,
            ctd_title: None,
            source: declaration.source.clone(),
            accession: inherited.accession,
            license: declaration.license.clone(),
        }
    }

    /// Resolve a file node. `folder` is the context of its containing folder
    /// (already including that folder's own declaration).
    pub fn resolve_file(
        name: &str,
        declaration: &FileDeclaration,
        folder: &InheritedContext,
    ) -> ResolvedMetadata {
        ResolvedMetadata {
            title: declaration
                .title
                .clone()
                .unwrap_or_else(|| name.to_string()),
            summary: declaration.summary.clone(),
            tags: declaration.tags.clone().unwrap_or_default(),
            date: declaration.date.as_deref().map(normalize_date),
            drug: folder.drug.clone(),
            ctd_module: declaration.ctd_module.clone(),
            ctd_title: declaration.ctd_title.clone(),
            source: None,
            accession: folder.accession.clone(),
            license: None,
        }
    }
}
