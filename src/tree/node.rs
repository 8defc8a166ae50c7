//! Document node types

use crate::metadata::ResolvedMetadata;
use serde::{Deserialize, Serialize};

/// Node kind: folder or a file-type tag derived from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Csv,
    Txt,
    Image,
    Audio,
    Video,
    Archive,
    Other,
}

impl NodeKind {
    /// Classify a file by its extension (case-insensitive).
    pub fn from_file_name(name: &str) -> NodeKind {
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return NodeKind::Other,
        };
        match ext.as_str() {
            "pdf" => NodeKind::Pdf,
            "doc" => NodeKind::Doc,
            "docx" => NodeKind::Docx,
            "xls" => NodeKind::Xls,
            "xlsx" | "xlsm" => NodeKind::Xlsx,
            "csv" => NodeKind::Csv,
            "txt" => NodeKind::Txt,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "svg" | "webp" => {
                NodeKind::Image
            }
            "mp3" | "wav" | "m4a" | "flac" | "ogg" | "aac" => NodeKind::Audio,
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" => NodeKind::Video,
            "zip" | "gz" | "tgz" | "tar" | "7z" => NodeKind::Archive,
            _ => NodeKind::Other,
        }
    }

    pub fn is_folder(self) -> bool {
        self == NodeKind::Folder
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Pdf => "pdf",
            NodeKind::Doc => "doc",
            NodeKind::Docx => "docx",
            NodeKind::Xls => "xls",
            NodeKind::Xlsx => "xlsx",
            NodeKind::Csv => "csv",
            NodeKind::Txt => "txt",
            NodeKind::Image => "image",
            NodeKind::Audio => "audio",
            NodeKind::Video => "video",
            NodeKind::Archive => "archive",
            NodeKind::Other => "other",
        }
    }
}

/// Whether a folder's children are materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredContents<'a> {
    Loaded(&'a [DocumentNode]),
    Unloaded { fragment_ref: &'a str },
}

/// One entry of the index tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DocumentNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_ref: Option<String>,
    #[serde(flatten)]
    pub metadata: ResolvedMetadata,
}

impl DocumentNode {
    /// A loaded folder.
    pub fn folder(
        name: impl Into<String>,
        path: impl Into<String>,
        metadata: ResolvedMetadata,
        children: Vec<DocumentNode>,
    ) -> DocumentNode {
        DocumentNode {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Folder,
            children: Some(children),
            fragment_ref: None,
            metadata,
        }
    }

    /// A file leaf; the kind is derived from the name.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        metadata: ResolvedMetadata,
    ) -> DocumentNode {
        let name = name.into();
        DocumentNode {
            kind: NodeKind::from_file_name(&name),
            name,
            path: path.into(),
            children: None,
            fragment_ref: None,
            metadata,
        }
    }

    /// Folder contents as stored in this node. `None` for files and for
    /// folders that carry neither children nor a fragment reference.
    pub fn contents(&self) -> Option<StoredContents<'_>> {
        if !self.kind.is_folder() {
            return None;
        }
        match (&self.children, &self.fragment_ref) {
            (Some(children), _) => Some(StoredContents::Loaded(children)),
            (None, Some(fragment_ref)) => Some(StoredContents::Unloaded { fragment_ref }),
            (None, None) => None,
        }
    }

    /// Loaded children, empty for files and unloaded folders.
    pub fn loaded_children(&self) -> &[DocumentNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Stub standing in for this folder once its subtree moves to a fragment.
    pub fn to_stub(&self) -> DocumentNode {
        DocumentNode {
            name: self.name.clone(),
            path: self.path.clone(),
            kind: self.kind,
            children: None,
            fragment_ref: Some(self.path.clone()),
            metadata: self.metadata.clone(),
        }
    }

    /// Path segments of `path` below this node, or `None` if `path` is not
    /// this node or one of its descendants.
    fn relative_segments<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        if path == self.path {
            return Some(Vec::new());
        }
        let rest = path.strip_prefix(self.path.as_str())?.strip_prefix('/')?;
        Some(rest.split('/').collect())
    }

    /// Find a loaded node by path.
    pub fn find(&self, path: &str) -> Option<&DocumentNode> {
        let mut node = self;
        for segment in self.relative_segments(path)? {
            node = node.loaded_children().iter().find(|c| c.name == segment)?;
        }
        Some(node)
    }

    /// Find a loaded node by path for mutation.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut DocumentNode> {
        let segments = self.relative_segments(path)?;
        let mut node = self;
        for segment in segments {
            node = node
                .children
                .as_mut()?
                .iter_mut()
                .find(|c| c.name == segment)?;
        }
        Some(node)
    }

    /// Deepest loaded node on the way to `path`; `path` itself when loaded.
    pub fn deepest_loaded(&self, path: &str) -> Option<&DocumentNode> {
        let mut node = self;
        for segment in self.relative_segments(path)? {
            match node.loaded_children().iter().find(|c| c.name == segment) {
                Some(child) => node = child,
                None => break,
            }
        }
        Some(node)
    }

    /// Paths of the loaded ancestors of `path`, root first. `None` if the
    /// path is not in the loaded tree.
    pub fn ancestor_paths(&self, path: &str) -> Option<Vec<String>> {
        let mut ancestors = Vec::new();
        let mut node = self;
        for segment in self.relative_segments(path)? {
            ancestors.push(node.path.clone());
            node = node.loaded_children().iter().find(|c| c.name == segment)?;
        }
        Some(ancestors)
    }

    /// Preorder walk over the loaded tree with each node's depth.
    pub fn walk<F>(&self, visit: &mut F)
    where
        F: FnMut(&DocumentNode, usize),
    {
        self.walk_at(0, visit);
    }

    fn walk_at<F>(&self, depth: usize, visit: &mut F)
    where
        F: FnMut(&DocumentNode, usize),
    {
        visit(self, depth);
        for child in self.loaded_children() {
            child.walk_at(depth + 1, visit);
        }
    }

    /// Number of loaded nodes, this one included.
    pub fn loaded_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, _| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> ResolvedMetadata {
        ResolvedMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn sample() -> DocumentNode {
        DocumentNode::folder(
            "documents",
            "documents",
            meta("Documents"),
            vec![DocumentNode::folder(
                "A",
                "documents/A",
                meta("A"),
                vec![
                    DocumentNode::file("report.pdf", "documents/A/report.pdf", meta("Report")),
                    DocumentNode::folder("B", "documents/A/B", meta("B"), Vec::new()).to_stub(),
                ],
            )],
        )
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(NodeKind::from_file_name("a.PDF"), NodeKind::Pdf);
        assert_eq!(NodeKind::from_file_name("t.xlsx"), NodeKind::Xlsx);
        assert_eq!(NodeKind::from_file_name("scan.JPEG"), NodeKind::Image);
        assert_eq!(NodeKind::from_file_name("data.xpt"), NodeKind::Other);
        assert_eq!(NodeKind::from_file_name("README"), NodeKind::Other);
        assert_eq!(NodeKind::from_file_name(".hidden"), NodeKind::Other);
    }

    #[test]
    fn test_find_and_ancestors() {
        let tree = sample();
        assert_eq!(tree.find("documents/A/report.pdf").unwrap().metadata.title, "Report");
        assert!(tree.find("documents/A/missing").is_none());
        assert!(tree.find("documentsX").is_none());
        assert_eq!(
            tree.ancestor_paths("documents/A/report.pdf").unwrap(),
            vec!["documents".to_string(), "documents/A".to_string()]
        );
        assert_eq!(tree.ancestor_paths("documents").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_deepest_loaded_stops_at_stub() {
        let tree = sample();
        assert_eq!(
            tree.deepest_loaded("documents/A/B/C/d.pdf").unwrap().path,
            "documents/A/B"
        );
        assert_eq!(
            tree.deepest_loaded("documents/A/report.pdf").unwrap().path,
            "documents/A/report.pdf"
        );
        assert!(tree.deepest_loaded("elsewhere/A").is_none());
    }

    #[test]
    fn test_contents_states() {
        let tree = sample();
        let stub = tree.find("documents/A/B").unwrap();
        assert_eq!(
            stub.contents(),
            Some(StoredContents::Unloaded {
                fragment_ref: "documents/A/B"
            })
        );
        assert!(tree.find("documents/A/report.pdf").unwrap().contents().is_none());
        assert!(matches!(tree.contents(), Some(StoredContents::Loaded(_))));
    }

    #[test]
    fn test_serialized_shape() {
        let tree = sample();
        let json = serde_json::to_value(&tree).unwrap();
        let a = &json["children"][0];
        assert_eq!(a["kind"], "folder");
        assert_eq!(a["children"][0]["kind"], "pdf");
        assert_eq!(a["children"][1]["fragmentRef"], "documents/A/B");
        assert!(a["children"][1].get("children").is_none());

        let back: DocumentNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_loaded_count_skips_unloaded() {
        assert_eq!(sample().loaded_count(), 4);
    }
}
