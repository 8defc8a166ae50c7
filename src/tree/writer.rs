//! Writes a build's output documents to disk
//!
//! Every document is written to a sibling temp file and renamed into place,
//! so a consumer polling the output never reads a half-written index.

use super::builder::BuildOutput;
use super::listing::build_listing;
use super::markdown::render_markdown;
use super::node::DocumentNode;
use super::partition::fragment_locator;
use crate::config::IndexConfig;
use crate::error::ApiError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files produced by one write
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    pub index_path: PathBuf,
    pub fragment_paths: Vec<PathBuf>,
    pub markdown_path: Option<PathBuf>,
    pub listing_path: Option<PathBuf>,
    pub bytes_written: u64,
}

/// Serializes the index, its fragments, and the optional markdown and flat
/// file listings
#[derive(Debug, Clone)]
pub struct IndexWriter {
    output_dir: PathBuf,
    index_file: String,
    fragment_file: String,
    pretty: bool,
    markdown_file: Option<String>,
    listing_file: Option<String>,
    base_url: Option<String>,
}

impl IndexWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            index_file: "toc.json".to_string(),
            fragment_file: "toc.json".to_string(),
            pretty: true,
            markdown_file: None,
            listing_file: None,
            base_url: None,
        }
    }

    /// Writer configured from the `output` section. Relative paths in
    /// `config` must already be resolved.
    pub fn from_config(config: &IndexConfig) -> Self {
        let output = &config.output;
        Self {
            output_dir: output.output_dir.clone(),
            index_file: output.index_file.clone(),
            fragment_file: output.fragment_file.clone(),
            pretty: output.pretty,
            markdown_file: output.markdown.then(|| output.markdown_file.clone()),
            listing_file: output.listing.then(|| output.listing_file.clone()),
            base_url: output.base_url.clone(),
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_markdown(mut self, file: impl Into<String>, base_url: Option<String>) -> Self {
        self.markdown_file = Some(file.into());
        self.base_url = base_url;
        self
    }

    pub fn with_listing(mut self, file: impl Into<String>) -> Self {
        self.listing_file = Some(file.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the document holding the fragment with `fragment_ref`.
    pub fn fragment_path(&self, fragment_ref: &str) -> PathBuf {
        self.output_dir
            .join(fragment_locator(fragment_ref, &self.fragment_file))
    }

    pub fn write(&self, output: &BuildOutput) -> Result<WriteSummary, ApiError> {
        let mut summary = WriteSummary {
            index_path: self.output_dir.join(&self.index_file),
            ..Default::default()
        };

        summary.bytes_written += self.write_node(&summary.index_path, &output.index)?;

        for fragment in &output.fragments {
            let path = self.fragment_path(&fragment.path);
            summary.bytes_written += self.write_node(&path, fragment)?;
            summary.fragment_paths.push(path);
        }

        if let Some(markdown_file) = &self.markdown_file {
            let path = self.output_dir.join(markdown_file);
            let rendered =
                render_markdown(&output.index, &output.fragments, self.base_url.as_deref());
            write_atomic(&path, rendered.as_bytes())?;
            summary.bytes_written += rendered.len() as u64;
            summary.markdown_path = Some(path);
        }

        if let Some(listing_file) = &self.listing_file {
            let path = self.output_dir.join(listing_file);
            let listing =
                build_listing(&output.index, &output.fragments, self.base_url.as_deref());
            let bytes = self.to_json(&listing)?;
            write_atomic(&path, &bytes)?;
            debug!(path = %path.display(), files = listing.count, "Wrote file listing");
            summary.bytes_written += bytes.len() as u64;
            summary.listing_path = Some(path);
        }

        info!(
            index = %summary.index_path.display(),
            fragments = summary.fragment_paths.len(),
            bytes = summary.bytes_written,
            "Index written"
        );
        Ok(summary)
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ApiError> {
        let mut bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn write_node(&self, path: &Path, node: &DocumentNode) -> Result<u64, ApiError> {
        let bytes = self.to_json(node)?;
        write_atomic(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote index document");
        Ok(bytes.len() as u64)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ResolvedMetadata;
    use crate::tree::builder::BuildReport;
    use crate::tree::listing::FileListing;
    use tempfile::TempDir;

    fn meta(title: &str) -> ResolvedMetadata {
        ResolvedMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn sample_output() -> BuildOutput {
        let big = DocumentNode::folder(
            "Big",
            "documents/Big",
            meta("Big"),
            vec![DocumentNode::file("a.pdf", "documents/Big/a.pdf", meta("A"))],
        );
        let index = DocumentNode::folder(
            "documents",
            "documents",
            meta("Docs"),
            vec![big.to_stub()],
        );
        BuildOutput {
            index,
            fragments: vec![big],
            report: BuildReport::default(),
        }
    }

    #[test]
    fn test_writes_index_and_fragments() {
        let dir = TempDir::new().unwrap();
        let writer = IndexWriter::new(dir.path()).with_pretty(false);
        let summary = writer.write(&sample_output()).unwrap();

        assert_eq!(summary.index_path, dir.path().join("toc.json"));
        assert_eq!(
            summary.fragment_paths,
            vec![dir.path().join("documents/Big/toc.json")]
        );

        let fragment: DocumentNode = serde_json::from_slice(
            &fs::read(dir.path().join("documents/Big/toc.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(fragment.path, "documents/Big");
        assert_eq!(fragment.loaded_children().len(), 1);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_markdown_is_optional() {
        let dir = TempDir::new().unwrap();
        let summary = IndexWriter::new(dir.path())
            .write(&sample_output())
            .unwrap();
        assert!(summary.markdown_path.is_none());
        assert!(!dir.path().join("toc.md").exists());

        let summary = IndexWriter::new(dir.path())
            .with_markdown("toc.md", Some("https://archive.example".to_string()))
            .write(&sample_output())
            .unwrap();
        let md = fs::read_to_string(summary.markdown_path.unwrap()).unwrap();
        assert!(md.contains("(https://archive.example/#documents/Big/a.pdf)"));
    }

    #[test]
    fn test_listing_is_written_when_enabled() {
        let dir = TempDir::new().unwrap();
        let summary = IndexWriter::new(dir.path())
            .write(&sample_output())
            .unwrap();
        assert!(summary.listing_path.is_none());

        let mut config = IndexConfig::default();
        config.output.output_dir = dir.path().to_path_buf();
        config.output.listing = true;
        let summary = IndexWriter::from_config(&config)
            .write(&sample_output())
            .unwrap();
        let path = summary.listing_path.unwrap();
        assert_eq!(path, dir.path().join("files.json"));

        let listing: FileListing = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(listing.count, 1);
        assert_eq!(listing.files[0].path, "documents/Big/a.pdf");
        assert_eq!(listing.files[0].metadata.title, "A");
    }

    #[test]
    fn test_rewrite_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let writer = IndexWriter::new(dir.path());
        writer.write(&sample_output()).unwrap();
        let first = fs::read(dir.path().join("toc.json")).unwrap();
        writer.write(&sample_output()).unwrap();
        assert_eq!(first, fs::read(dir.path().join("toc.json")).unwrap());
    }
}
