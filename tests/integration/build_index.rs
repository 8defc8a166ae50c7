use std::fs;

use ctd_index::consumer::{FragmentFetcher, FsFragmentFetcher};
use ctd_index::tree::{DocumentNode, IndexWriter, NodeKind};
use tempfile::TempDir;

use crate::integration::support::{build, config_for, seed_submission, write_file};

fn find<'a>(index: &'a DocumentNode, path: &str) -> &'a DocumentNode {
    index
        .find(path)
        .unwrap_or_else(|| panic!("{path} missing from index"))
}

#[test]
fn drug_inherits_from_nearest_declaring_ancestor() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_file(root, "documents/A/metadata.json", r#"{"_folder": {"drug": "X"}}"#);
    write_file(
        root,
        "documents/A/B/metadata.json",
        r#"{"report.pdf": {"title": "Report"}}"#,
    );
    write_file(root, "documents/A/B/report.pdf", "pdf");

    let output = build(root, None);
    let report = find(&output.index, "documents/A/B/report.pdf");
    assert_eq!(report.metadata.drug.as_deref(), Some("X"));
    assert_eq!(report.metadata.title, "Report");
    assert!(report.metadata.tags.is_empty());
    assert_eq!(report.kind, NodeKind::Pdf);

    let b = find(&output.index, "documents/A/B");
    assert_eq!(b.metadata.title, "B");
    assert_eq!(b.metadata.drug.as_deref(), Some("X"));
    assert_eq!(output.index.metadata.drug, None);
}

#[test]
fn primary_declaration_wins_field_by_field_over_alternate() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_file(
        root,
        "documents/A/metadata.json",
        r#"{"_folder": {"drug": "X"}, "a.pdf": {"title": "Primary"}}"#,
    );
    write_file(
        root,
        "documents/A/__metadata.json",
        r#"{"_folder": {"drug": "Y", "title": "Alternate Title"},
            "a.pdf": {"title": "Alternate", "date": "2021-06-01"}}"#,
    );
    write_file(root, "documents/A/a.pdf", "pdf");

    let output = build(root, None);
    let folder = find(&output.index, "documents/A");
    assert_eq!(folder.metadata.drug.as_deref(), Some("X"));
    assert_eq!(folder.metadata.title, "Alternate Title");

    let file = find(&output.index, "documents/A/a.pdf");
    assert_eq!(file.metadata.title, "Primary");
    assert!(file.metadata.date.is_some());
    assert_eq!(file.metadata.drug.as_deref(), Some("X"));

    // Declaration files never appear as nodes.
    assert_eq!(folder.loaded_children().len(), 1);
}

#[test]
fn every_child_path_extends_its_parent_path() {
    let temp_dir = TempDir::new().unwrap();
    seed_submission(temp_dir.path());
    let output = build(temp_dir.path(), Some(200));

    let mut trees = vec![output.index.clone()];
    trees.extend(output.fragments.iter().cloned());
    for tree in &trees {
        tree.walk(&mut |node, _| {
            for child in node.loaded_children() {
                assert_eq!(child.path, format!("{}/{}", node.path, child.name));
            }
        });
    }
    assert_eq!(output.index.path, "documents");
}

#[test]
fn rebuilding_unchanged_tree_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    seed_submission(root);
    let config = config_for(root, Some(200));
    let writer = IndexWriter::from_config(&config).with_markdown("toc.md", None);

    let first = writer.write(&build(root, Some(200))).unwrap();
    let mut before = vec![fs::read(&first.index_path).unwrap()];
    for path in &first.fragment_paths {
        before.push(fs::read(path).unwrap());
    }
    let markdown = fs::read(first.markdown_path.as_ref().unwrap()).unwrap();

    let second = writer.write(&build(root, Some(200))).unwrap();
    assert_eq!(first.fragment_paths, second.fragment_paths);
    let mut after = vec![fs::read(&second.index_path).unwrap()];
    for path in &second.fragment_paths {
        after.push(fs::read(path).unwrap());
    }
    assert_eq!(before, after);
    assert_eq!(markdown, fs::read(second.markdown_path.unwrap()).unwrap());
}

#[test]
fn stored_fragment_loads_back_through_fs_fetcher() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    seed_submission(root);
    let config = config_for(root, Some(200));
    let output = build(root, Some(200));
    IndexWriter::from_config(&config).write(&output).unwrap();

    let fragment_ref = "documents/Module 5/Efficacy/204";
    assert!(output.fragments.iter().any(|f| f.path == fragment_ref));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let fetcher = FsFragmentFetcher::new(&config.output.output_dir, "toc.json");
    let fragment = runtime.block_on(fetcher.fetch(fragment_ref)).unwrap();

    assert_eq!(fragment.path, fragment_ref);
    assert_eq!(fragment.kind, NodeKind::Folder);
    let names: Vec<&str> = fragment
        .loaded_children()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["csr.pdf", "synopsis.pdf"]);
}

#[test]
fn partitioned_folders_are_stubs_in_the_index() {
    let temp_dir = TempDir::new().unwrap();
    seed_submission(temp_dir.path());
    let output = build(temp_dir.path(), Some(200));

    assert!(!output.fragments.is_empty());
    assert_eq!(output.report.fragments, output.fragments.len());
    for fragment in &output.fragments {
        assert_ne!(fragment.path, output.index.path);
        assert!(fragment.children.is_some());
        assert_eq!(fragment.fragment_ref, None);
    }
    output.index.walk(&mut |node, _| {
        if let Some(fragment_ref) = &node.fragment_ref {
            assert_eq!(fragment_ref, &node.path);
            assert_eq!(node.children, None);
        }
    });
}

#[cfg(unix)]
#[test]
fn symlinked_folders_are_skipped_and_counted() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_file(root, "documents/A/a.pdf", "pdf");
    std::os::unix::fs::symlink(root.join("documents"), root.join("documents/A/loop")).unwrap();

    let output = build(root, None);
    assert_eq!(output.report.symlinks_skipped, 1);
    assert!(output.index.find("documents/A/loop").is_none());
    assert_eq!(output.report.files, 1);
}
