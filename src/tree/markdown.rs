//! Markdown rendering of the full index
//!
//! Fragments are spliced back in so the document lists every node. Folders
//! render as bold headings, files as links to `<base_url>/#<path>`.

use super::listing::node_link;
use super::node::DocumentNode;
use super::partition::FragmentSet;

/// Render the index and its fragments as one markdown document.
pub fn render_markdown(
    index: &DocumentNode,
    fragments: &[DocumentNode],
    base_url: Option<&str>,
) -> String {
    let renderer = MarkdownRenderer {
        fragments: FragmentSet::new(fragments),
        base_url,
    };

    let mut lines = vec![format!("# {}", index.metadata.title), String::new()];
    if let Some(summary) = &index.metadata.summary {
        lines.push(summary.clone());
        lines.push(String::new());
    }
    for child in renderer.fragments.children_of(index) {
        renderer.render(child, 0, &mut lines);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

struct MarkdownRenderer<'a> {
    fragments: FragmentSet<'a>,
    base_url: Option<&'a str>,
}

impl<'a> MarkdownRenderer<'a> {
    fn render(&self, node: &'a DocumentNode, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        if node.kind.is_folder() {
            lines.push(format!("{indent}- **{}/**", node.metadata.title));
            if let Some(summary) = &node.metadata.summary {
                lines.push(format!("{indent}  {summary}"));
            }
            for child in self.fragments.children_of(node) {
                self.render(child, depth + 1, lines);
            }
            return;
        }

        let mut line = format!(
            "{indent}- [{}]({}) ({})",
            node.metadata.title,
            node_link(self.base_url, &node.path),
            node.kind.as_str()
        );
        if let Some(drug) = &node.metadata.drug {
            line.push_str(&format!(" [{drug}]"));
        }
        if let Some(date) = &node.metadata.date {
            line.push_str(&format!(" ({date})"));
        }
        lines.push(line);
        if let Some(summary) = &node.metadata.summary {
            lines.push(format!("{indent}  {summary}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ResolvedMetadata;

    fn meta(title: &str) -> ResolvedMetadata {
        ResolvedMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_renders_nested_entries_with_fragments() {
        let mut report = meta("Final Report");
        report.drug = Some("ION-582".to_string());
        report.date = Some("2019-12-31".to_string());

        let big = DocumentNode::folder(
            "Big",
            "documents/Big",
            meta("Big"),
            vec![DocumentNode::file(
                "a b.pdf",
                "documents/Big/a b.pdf",
                report,
            )],
        );
        let index = DocumentNode::folder(
            "documents",
            "documents",
            meta("Archive"),
            vec![big.to_stub()],
        );

        let md = render_markdown(&index, &[big], Some("https://archive.example/"));
        assert_eq!(
            md,
            "# Archive\n\n- **Big/**\n  - [Final Report](https://archive.example/#documents/Big/a%20b.pdf) (pdf) [ION-582] (2019-12-31)\n"
        );
    }

    #[test]
    fn test_missing_fragment_renders_empty_folder() {
        let stub = DocumentNode::folder("X", "documents/X", meta("X"), Vec::new()).to_stub();
        let index = DocumentNode::folder("documents", "documents", meta("Docs"), vec![stub]);
        let md = render_markdown(&index, &[], None);
        assert!(md.ends_with("- **X/**\n"));
    }
}
