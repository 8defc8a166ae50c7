//! Format build reports, search results and tree rows as text.

use crate::consumer::{LoadState, Row};
use crate::tree::{BuildReport, DocumentNode, WriteSummary};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Format a build report and the files written.
pub fn format_build_text(report: &BuildReport, written: &WriteSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Index Build")));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Folders", "Files", "Fragments", "Symlinks skipped", "Time"]);
    table.add_row(vec![
        report.folders.to_string(),
        report.files.to_string(),
        report.fragments.to_string(),
        report.symlinks_skipped.to_string(),
        format!("{} ms", report.duration_ms),
    ]);
    out.push_str(&format!("{}\n\n", table));

    out.push_str(&format!("  Index: {}\n", written.index_path.display()));
    if let Some(md) = &written.markdown_path {
        out.push_str(&format!("  Markdown: {}\n", md.display()));
    }
    if let Some(listing) = &written.listing_path {
        out.push_str(&format!("  Listing: {}\n", listing.display()));
    }
    out.push_str(&format!("  Bytes written: {}\n", written.bytes_written));

    if !report.warnings.is_empty() {
        out.push_str(&format!(
            "\n{} ({})\n",
            format_section_heading("Warnings"),
            report.warnings.len()
        ));
        for warning in &report.warnings {
            out.push_str(&format!("  {} {}\n", "!".yellow(), warning));
        }
    }
    out
}

/// Format search matches as a table.
pub fn format_matches_text(query: &str, matches: &[DocumentNode]) -> String {
    if matches.is_empty() {
        return format!("No matches for {:?}\n", query);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Title", "Kind"]);
    for node in matches {
        table.add_row(vec![
            node.path.clone(),
            node.metadata.title.clone(),
            node.kind.as_str().to_string(),
        ]);
    }
    format!("{} match(es) for {:?}\n\n{}\n", matches.len(), query, table)
}

/// Format visible rows as an indented outline.
pub fn format_rows_text(rows: &[Row]) -> String {
    let mut out = String::new();
    for row in rows {
        let indent = "  ".repeat(row.depth);
        let marker = match (row.load_state, row.expanded) {
            (None, _) => " ",
            (Some(_), true) => "▾",
            (Some(_), false) => "▸",
        };
        let label = if row.title == row.name {
            row.name.clone()
        } else {
            format!("{} ({})", row.title, row.name)
        };
        let label = if row.matched {
            format!("{}", label.green().bold())
        } else {
            label
        };
        let suffix = match row.load_state {
            Some(LoadState::Unloaded) => format!(" {}", "[not loaded]".dimmed()),
            Some(LoadState::Loading) => format!(" {}", "[loading]".dimmed()),
            _ => String::new(),
        };
        out.push_str(&format!("{}{} {}{}\n", indent, marker, label, suffix));
    }
    out
}
