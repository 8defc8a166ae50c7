//! Fragment fetchers
//!
//! A fetcher turns a `fragmentRef` into the parsed fragment document. It does
//! not check what it parsed; `validate_fragment` does that for every fetcher.

use crate::error::FetchError;
use crate::tree::{fragment_locator, DocumentNode};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Source of fragment documents
#[async_trait]
pub trait FragmentFetcher: Send + Sync {
    /// Fetch and parse the fragment stored under `fragment_ref`.
    async fn fetch(&self, fragment_ref: &str) -> Result<DocumentNode, FetchError>;
}

/// Check that a fetched fragment is the folder it was fetched for.
pub fn validate_fragment(fragment_ref: &str, fragment: &DocumentNode) -> Result<(), FetchError> {
    if fragment.path != fragment_ref {
        return Err(FetchError::RootMismatch {
            expected: fragment_ref.to_string(),
            actual: fragment.path.clone(),
        });
    }
    if !fragment.kind.is_folder() || fragment.children.is_none() {
        return Err(FetchError::NotAFolder(fragment.path.clone()));
    }
    Ok(())
}

/// Split a reference into path segments, rejecting anything that could
/// escape the fragment root.
fn ref_segments(fragment_ref: &str) -> Result<Vec<&str>, FetchError> {
    let segments: Vec<&str> = fragment_ref.split('/').collect();
    let invalid = fragment_ref.contains('\\')
        || segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..");
    if invalid {
        return Err(FetchError::InvalidLocator(fragment_ref.to_string()));
    }
    Ok(segments)
}

/// Reads fragments from the build's output directory
#[derive(Debug, Clone)]
pub struct FsFragmentFetcher {
    base_dir: PathBuf,
    fragment_file: String,
}

impl FsFragmentFetcher {
    pub fn new(base_dir: impl Into<PathBuf>, fragment_file: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fragment_file: fragment_file.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn location(&self, fragment_ref: &str) -> Result<PathBuf, FetchError> {
        ref_segments(fragment_ref)?;
        Ok(self
            .base_dir
            .join(fragment_locator(fragment_ref, &self.fragment_file)))
    }
}

#[async_trait]
impl FragmentFetcher for FsFragmentFetcher {
    async fn fetch(&self, fragment_ref: &str) -> Result<DocumentNode, FetchError> {
        let location = self.location(fragment_ref)?;
        debug!(location = %location.display(), "Reading fragment");
        let bytes = tokio::fs::read(&location)
            .await
            .map_err(|source| FetchError::Storage {
                location: location.display().to_string(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Fetches fragments over HTTP from `<base_url>/<ref>/<fragment file>`
#[derive(Debug, Clone)]
pub struct HttpFragmentFetcher {
    client: Client,
    base_url: Url,
    fragment_file: String,
}

impl HttpFragmentFetcher {
    pub fn new(
        base_url: &str,
        fragment_file: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|e| FetchError::InvalidLocator(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidLocator(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            fragment_file: fragment_file.into(),
        })
    }

    /// URL of the fragment document; segments are percent-encoded.
    pub fn fragment_url(&self, fragment_ref: &str) -> Result<Url, FetchError> {
        let segments = ref_segments(fragment_ref)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidLocator(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push(&self.fragment_file);
        Ok(url)
    }
}

#[async_trait]
impl FragmentFetcher for HttpFragmentFetcher {
    async fn fetch(&self, fragment_ref: &str) -> Result<DocumentNode, FetchError> {
        let url = self.fragment_url(fragment_ref)?;
        info!(url = %url, "Fetching fragment");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ResolvedMetadata;
    use tempfile::TempDir;

    fn folder(path: &str) -> DocumentNode {
        DocumentNode::folder("x", path, ResolvedMetadata::default(), Vec::new())
    }

    #[test]
    fn test_validate_fragment() {
        assert!(validate_fragment("documents/A", &folder("documents/A")).is_ok());
        assert!(matches!(
            validate_fragment("documents/A", &folder("documents/B")),
            Err(FetchError::RootMismatch { .. })
        ));
        assert!(matches!(
            validate_fragment("documents/A", &folder("documents/A").to_stub()),
            Err(FetchError::NotAFolder(_))
        ));
    }

    #[test]
    fn test_rejects_escaping_refs() {
        for bad in ["", "../etc", "documents//A", "documents/./A", "a\\b"] {
            assert!(
                matches!(ref_segments(bad), Err(FetchError::InvalidLocator(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_fragment_url_encodes_segments() {
        let fetcher = HttpFragmentFetcher::new(
            "https://archive.example/data/",
            "toc.json",
            Duration::from_secs(1),
        )
        .unwrap();
        let url = fetcher.fragment_url("documents/Module 5/5.3#1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://archive.example/data/documents/Module%205/5.3%231/toc.json"
        );
    }

    #[test]
    fn test_http_fetcher_rejects_bad_base() {
        assert!(HttpFragmentFetcher::new("not a url", "toc.json", Duration::from_secs(1)).is_err());
        assert!(HttpFragmentFetcher::new("mailto:x@y", "toc.json", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_fs_fetcher_reads_fragment() {
        let dir = TempDir::new().unwrap();
        let fragment = folder("documents/A");
        std::fs::create_dir_all(dir.path().join("documents/A")).unwrap();
        std::fs::write(
            dir.path().join("documents/A/toc.json"),
            serde_json::to_vec(&fragment).unwrap(),
        )
        .unwrap();

        let fetcher = FsFragmentFetcher::new(dir.path(), "toc.json");
        assert_eq!(fetcher.fetch("documents/A").await.unwrap(), fragment);
        assert!(matches!(
            fetcher.fetch("documents/B").await,
            Err(FetchError::Storage { .. })
        ));
    }
}
