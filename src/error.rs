//! Error types
//!
//! `ApiError` is the top-level error returned by builder, writer, consumer and
//! CLI operations. Metadata and fetch failures have their own enums because
//! they are recoverable: metadata failures degrade a folder to defaults, fetch
//! failures leave a folder `Unloaded` and retryable.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Document root is not a readable directory: {0}")]
    RootUnavailable(PathBuf),

    #[error("Cyclic structure detected at {0}")]
    CyclicStructure(String),

    #[error("Path not found in loaded index: {0}")]
    PathNotFound(String),

    #[error("Not a folder: {0}")]
    NotAFolder(String),

    #[error("Fragment {fragment_ref} unavailable: {source}")]
    FragmentUnavailable {
        fragment_ref: String,
        #[source]
        source: FetchError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

/// Failure to read one metadata declaration file
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Malformed metadata in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Unreadable metadata file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MetadataError {
    pub fn path(&self) -> &PathBuf {
        match self {
            MetadataError::Malformed { path, .. } | MetadataError::Unreadable { path, .. } => path,
        }
    }
}

/// Failure to fetch a fragment. Every variant is a `FragmentUnavailable`
/// condition from the consumer's point of view.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("storage error reading {location}: {source}")]
    Storage {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed fragment JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("fragment root path {actual} does not match reference {expected}")]
    RootMismatch { expected: String, actual: String },

    #[error("fragment root {0} is not a loaded folder")]
    NotAFolder(String),

    #[error("invalid fragment locator: {0}")]
    InvalidLocator(String),

    #[error("fetch abandoned before completion")]
    Abandoned,

    #[error("in-flight fetch failed: {0}")]
    Joined(String),
}
