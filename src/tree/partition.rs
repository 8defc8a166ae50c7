//! Fragment partitioning
//!
//! A folder whose compact JSON form exceeds the threshold is moved out into
//! its own fragment document, leaving a stub with `fragmentRef` in the
//! parent. The fragment reference is the folder's path; the fragment file is
//! stored at `<ref>/<fragment file name>` relative to the output root.

use super::node::DocumentNode;
use std::collections::HashMap;
use std::io;

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Length of the compact JSON serialization of `node`, without allocating it.
pub fn serialized_len(node: &DocumentNode) -> Result<usize, serde_json::Error> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, node)?;
    Ok(counter.0)
}

/// Relative locator of the document holding a fragment.
pub fn fragment_locator(fragment_ref: &str, fragment_file: &str) -> String {
    format!("{}/{}", fragment_ref.trim_end_matches('/'), fragment_file)
}

/// A build's fragments keyed by reference, for walking an index with its
/// stubs filled back in
pub struct FragmentSet<'a> {
    by_ref: HashMap<&'a str, &'a DocumentNode>,
}

impl<'a> FragmentSet<'a> {
    pub fn new(fragments: &'a [DocumentNode]) -> Self {
        Self {
            by_ref: fragments.iter().map(|f| (f.path.as_str(), f)).collect(),
        }
    }

    /// Children of `node`, read from its fragment when `node` is a stub.
    /// A stub whose fragment is missing has no children.
    pub fn children_of(&self, node: &'a DocumentNode) -> &'a [DocumentNode] {
        match (&node.children, &node.fragment_ref) {
            (Some(children), _) => children,
            (None, Some(fragment_ref)) => self
                .by_ref
                .get(fragment_ref.as_str())
                .map(|fragment| fragment.loaded_children())
                .unwrap_or(&[]),
            (None, None) => &[],
        }
    }
}

/// Decides which folders become fragments
#[derive(Debug, Clone)]
pub struct Partitioner {
    threshold_bytes: Option<usize>,
    fragments: Vec<DocumentNode>,
}

impl Partitioner {
    pub fn new(threshold_bytes: Option<usize>) -> Self {
        Self {
            threshold_bytes,
            fragments: Vec::new(),
        }
    }

    /// Return the node to place in the parent: the folder itself when it fits,
    /// otherwise a stub, with the full folder recorded as a fragment.
    pub fn place(&mut self, folder: DocumentNode) -> Result<DocumentNode, serde_json::Error> {
        let threshold = match self.threshold_bytes {
            Some(threshold) if folder.kind.is_folder() => threshold,
            _ => return Ok(folder),
        };
        if serialized_len(&folder)? <= threshold {
            return Ok(folder);
        }
        let stub = folder.to_stub();
        tracing::debug!(path = %folder.path, "Partitioned folder into fragment");
        self.fragments.push(folder);
        Ok(stub)
    }

    /// Fragments emitted so far, sorted by path.
    pub fn into_fragments(mut self) -> Vec<DocumentNode> {
        self.fragments.sort_by(|a, b| a.path.cmp(&b.path));
        self.fragments
    }
}
