use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctd_index::config::IndexConfig;
use ctd_index::consumer::FragmentFetcher;
use ctd_index::error::FetchError;
use ctd_index::tree::{BuildOutput, DocumentNode, IndexBuilder};

/// Write `contents` at `root/relative`, creating parent folders.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Index config for a workspace whose documents live under `root/documents`.
pub fn config_for(root: &Path, threshold: Option<usize>) -> IndexConfig {
    let mut config = IndexConfig::default();
    config.partition.enabled = threshold.is_some();
    config.partition.threshold_bytes = threshold.unwrap_or(1);
    config.resolved(root).unwrap()
}

pub fn build(root: &Path, threshold: Option<usize>) -> BuildOutput {
    let config = config_for(root, threshold);
    IndexBuilder::from_config(&config)
        .build(&config.archive.documents_dir)
        .unwrap()
}

/// Small submission: clinical studies three levels deep plus a quality module.
pub fn seed_submission(root: &Path) {
    write_file(
        root,
        "documents/metadata.json",
        r#"{"_folder": {"title": "Submission", "drug": "ION-582"}}"#,
    );
    write_file(
        root,
        "documents/Module 5/metadata.json",
        r#"{"_folder": {"title": "Clinical Study Reports"}}"#,
    );
    for study in ["101", "204", "310"] {
        let folder = format!("documents/Module 5/Efficacy/{study}");
        write_file(root, &format!("{folder}/csr.pdf"), "pdf");
        write_file(root, &format!("{folder}/synopsis.pdf"), "pdf");
        write_file(
            root,
            &format!("{folder}/metadata.json"),
            &format!(
                r#"{{"csr.pdf": {{"title": "Study {study} Clinical Study Report", "date": "2023-01-15"}},
                    "synopsis.pdf": {{"title": "Synopsis", "tags": ["synopsis"]}}}}"#
            ),
        );
    }
    write_file(root, "documents/Module 3/specifications.pdf", "pdf");
}

/// Fetcher serving fragments from memory, counting calls and pausing
/// before each response.
pub struct CountingFetcher {
    fragments: BTreeMap<String, DocumentNode>,
    delay: Duration,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl CountingFetcher {
    pub fn new(output: &BuildOutput, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fragments: output
                .fragments
                .iter()
                .map(|f| (f.path.clone(), f.clone()))
                .collect(),
            delay,
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        })
    }

    /// Fail the next `count` fetches.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FragmentFetcher for CountingFetcher {
    async fn fetch(&self, fragment_ref: &str) -> Result<DocumentNode, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FetchError::Storage {
                location: fragment_ref.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated outage"),
            });
        }
        self.fragments
            .get(fragment_ref)
            .cloned()
            .ok_or(FetchError::InvalidLocator(fragment_ref.to_string()))
    }
}
