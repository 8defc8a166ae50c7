//! Substring search over the loaded tree

use crate::text::fold_case;
use crate::tree::DocumentNode;
use std::collections::BTreeSet;

/// Result of the current query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    /// Paths of matching nodes
    pub matches: BTreeSet<String>,
    /// Paths of every ancestor of a match
    pub match_ancestors: BTreeSet<String>,
}

impl SearchState {
    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    /// Match `query` against `name`, `title` and `summary` of every loaded
    /// node. An empty query matches nothing.
    pub fn compute(tree: &DocumentNode, query: &str) -> SearchState {
        let mut state = SearchState {
            query: query.to_string(),
            ..Default::default()
        };
        if query.is_empty() {
            return state;
        }
        let needle = fold_case(query);
        let mut ancestors = Vec::new();
        state.collect(tree, &needle, &mut ancestors);
        state
    }

    fn collect<'a>(&mut self, node: &'a DocumentNode, needle: &str, ancestors: &mut Vec<&'a str>) {
        if node_matches(node, needle) {
            self.matches.insert(node.path.clone());
            self.match_ancestors
                .extend(ancestors.iter().map(|a| a.to_string()));
        }
        ancestors.push(&node.path);
        for child in node.loaded_children() {
            self.collect(child, needle, ancestors);
        }
        ancestors.pop();
    }
}

/// Whether `node` contains the already case-folded `needle`.
pub fn node_matches(node: &DocumentNode, needle: &str) -> bool {
    let summary = node.metadata.summary.as_deref();
    [Some(node.name.as_str()), Some(node.metadata.title.as_str()), summary]
        .into_iter()
        .flatten()
        .any(|field| fold_case(field).contains(needle))
}
