use std::fs;

use ctd_index::config::{ConfigLoader, IndexConfig};
use ctd_index::error::ApiError;
use ctd_index::tree::IndexBuilder;
use tempfile::TempDir;

use crate::integration::support::write_file;

#[test]
fn workspace_file_drives_the_build() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let config_path = root.join("custom.toml");
    fs::write(
        &config_path,
        r#"
[archive]
documents_dir = "archive"
root_path = "submissions/current"
skip_names = ["draft.pdf"]

[partition]
enabled = false

[output]
output_dir = "site"
pretty = false
"#,
    )
    .unwrap();
    write_file(root, "archive/final.pdf", "pdf");
    write_file(root, "archive/draft.pdf", "pdf");

    let config = ConfigLoader::load_from_file(&config_path)
        .unwrap()
        .resolved(root)
        .unwrap();
    assert_eq!(config.archive.documents_dir, root.join("archive"));
    assert_eq!(config.output.output_dir, root.join("site"));
    assert_eq!(config.partition.threshold(), None);
    assert_eq!(config.output.index_file, "toc.json");

    let output = IndexBuilder::from_config(&config)
        .build(&config.archive.documents_dir)
        .unwrap();
    assert_eq!(output.index.path, "submissions/current");
    assert_eq!(output.index.name, "current");
    let names: Vec<&str> = output
        .index
        .loaded_children()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["final.pdf"]);
}

#[test]
fn missing_config_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).is_err());
}

#[test]
fn zero_threshold_is_rejected_when_partitioning() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = IndexConfig::default();
    config.partition.threshold_bytes = 0;
    let err = config.resolved(temp_dir.path()).unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));
}

#[test]
fn missing_documents_root_fails_the_build() {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexConfig::default().resolved(temp_dir.path()).unwrap();
    let err = IndexBuilder::from_config(&config)
        .build(&config.archive.documents_dir)
        .unwrap_err();
    assert!(matches!(err, ApiError::RootUnavailable(_)));
}
