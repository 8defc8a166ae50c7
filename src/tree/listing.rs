//! Flat file listing
//!
//! Every file in the index, fragments spliced back in, as one JSON document
//! in tree order. Entries carry their link and resolved metadata so a client
//! can filter the archive without walking folders.

use super::node::{DocumentNode, NodeKind};
use super::partition::FragmentSet;
use crate::metadata::ResolvedMetadata;
use serde::{Deserialize, Serialize};

/// One file in the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub url: String,
    #[serde(flatten)]
    pub metadata: ResolvedMetadata,
}

/// The listing document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub root: String,
    pub title: String,
    pub count: usize,
    pub files: Vec<FileEntry>,
}

/// Link to a node in the browser: `<base_url>/#<path>` with spaces escaped.
pub fn node_link(base_url: Option<&str>, path: &str) -> String {
    format!(
        "{}/#{}",
        base_url.map(|u| u.trim_end_matches('/')).unwrap_or(""),
        path.replace(' ', "%20")
    )
}

/// Collect every file under `index`, reading stubbed folders from `fragments`.
pub fn build_listing(
    index: &DocumentNode,
    fragments: &[DocumentNode],
    base_url: Option<&str>,
) -> FileListing {
    let fragments = FragmentSet::new(fragments);
    let mut files = Vec::new();
    let mut pending: Vec<&DocumentNode> = fragments.children_of(index).iter().rev().collect();

    while let Some(node) = pending.pop() {
        if node.kind.is_folder() {
            pending.extend(fragments.children_of(node).iter().rev());
            continue;
        }
        files.push(FileEntry {
            name: node.name.clone(),
            path: node.path.clone(),
            kind: node.kind,
            url: node_link(base_url, &node.path),
            metadata: node.metadata.clone(),
        });
    }

    FileListing {
        root: index.path.clone(),
        title: index.metadata.title.clone(),
        count: files.len(),
        files,
    }
}
