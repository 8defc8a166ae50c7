use std::sync::Arc;
use std::time::Duration;

use ctd_index::consumer::{ExpandOutcome, IndexConsumer, LoadState, Visibility};
use ctd_index::error::ApiError;
use ctd_index::tree::IndexWriter;
use tempfile::TempDir;

use crate::integration::support::{build, config_for, seed_submission, CountingFetcher};

const STUDY: &str = "documents/Module 5/Efficacy/204";

fn submission(delay: Duration) -> (TempDir, IndexConsumer, Arc<CountingFetcher>) {
    let temp_dir = TempDir::new().unwrap();
    seed_submission(temp_dir.path());
    let output = build(temp_dir.path(), Some(200));
    let fetcher = CountingFetcher::new(&output, delay);
    let consumer = IndexConsumer::new(output.index, fetcher.clone());
    (temp_dir, consumer, fetcher)
}

fn first_stub(consumer: &IndexConsumer) -> String {
    consumer
        .snapshot()
        .loaded_children()
        .iter()
        .find(|c| c.fragment_ref.is_some())
        .map(|c| c.path.clone())
        .expect("a partitioned top-level folder")
}

#[tokio::test(start_paused = true)]
async fn concurrent_expands_share_one_fetch() {
    let (_dir, consumer, fetcher) = submission(Duration::from_millis(50));
    let target = first_stub(&consumer);

    let (first, second) = tokio::join!(consumer.expand(&target), consumer.expand(&target));
    assert_eq!(first.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(second.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(consumer.load_state(&target), Some(LoadState::Loaded));
    assert!(consumer.expanded_paths().contains(&target));

    assert_eq!(consumer.expand(&target).await.unwrap(), ExpandOutcome::Collapsed);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expand_joining_a_load_all_fetch_still_toggles() {
    let (_dir, consumer, fetcher) = submission(Duration::from_millis(100));
    // load_all fetches the first top-level stub first.
    let target = first_stub(&consumer);

    let (loaded, expanded) = tokio::join!(consumer.load_all(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(consumer.load_state(&target), Some(LoadState::Loading));
        consumer.expand(&target).await
    });

    loaded.unwrap();
    assert_eq!(expanded.unwrap(), ExpandOutcome::Expanded);
    assert!(consumer.expanded_paths().contains(&target));
    // One fetch per fragment: the joined Expand added none.
    assert_eq!(fetcher.calls(), fetcher.fragment_count());

    assert_eq!(consumer.expand(&target).await.unwrap(), ExpandOutcome::Collapsed);
}

#[tokio::test]
async fn expand_on_loaded_folder_toggles_without_fetching() {
    let (_dir, consumer, fetcher) = submission(Duration::ZERO);
    let root = consumer.root_path();

    assert_eq!(consumer.expand(&root).await.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(consumer.expand(&root).await.unwrap(), ExpandOutcome::Collapsed);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(consumer.visibility(&root), Some(Visibility::Visible));
}

#[tokio::test]
async fn failed_fetch_leaves_state_untouched_and_can_be_retried() {
    let (_dir, consumer, fetcher) = submission(Duration::ZERO);
    let target = "documents/Module 5";
    assert_eq!(consumer.load_state(target), Some(LoadState::Unloaded));

    fetcher.fail_next(1);
    let err = consumer.expand(target).await.unwrap_err();
    assert!(matches!(err, ApiError::FragmentUnavailable { .. }));
    assert_eq!(consumer.load_state(target), Some(LoadState::Unloaded));
    assert!(!consumer.expanded_paths().contains(target));

    assert_eq!(consumer.expand(target).await.unwrap(), ExpandOutcome::Expanded);
    assert_eq!(consumer.load_state(target), Some(LoadState::Loaded));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn search_expands_every_ancestor_of_a_deep_match() {
    let (_dir, consumer, _fetcher) = submission(Duration::ZERO);

    // Search never fetches, so nothing under a stub matches yet.
    assert!(!consumer.search("204").contains(STUDY));

    consumer.load_all().await.unwrap();
    let matches = consumer.search("204");
    assert!(matches.contains(STUDY));

    let expanded = consumer.expanded_paths();
    for ancestor in ["documents", "documents/Module 5", "documents/Module 5/Efficacy"] {
        assert!(expanded.contains(ancestor), "{ancestor} not expanded");
    }
    assert_eq!(consumer.visibility(STUDY), Some(Visibility::Visible));
    assert_eq!(
        consumer.visibility("documents/Module 5/Efficacy/101"),
        Some(Visibility::Hidden)
    );
    assert_eq!(
        consumer.visibility("documents/Module 5/Efficacy/204/synopsis.pdf"),
        Some(Visibility::Visible)
    );
}

#[tokio::test]
async fn clearing_the_query_keeps_expanded_folders() {
    let (_dir, consumer, _fetcher) = submission(Duration::ZERO);
    consumer.load_all().await.unwrap();
    consumer.search("204");
    let expanded = consumer.expanded_paths();

    assert!(consumer.search("").is_empty());
    assert_eq!(consumer.expanded_paths(), expanded);
    assert!(!consumer.search_state().is_active());
    assert_eq!(
        consumer.visibility("documents/Module 5/Efficacy/101"),
        Some(Visibility::Visible)
    );
}

#[tokio::test]
async fn reveal_loads_only_the_folders_on_the_way() {
    let (_dir, consumer, fetcher) = submission(Duration::ZERO);
    let node = consumer
        .reveal("documents/Module 5/Efficacy/204/csr.pdf")
        .await
        .unwrap();
    assert_eq!(node.metadata.title, "Study 204 Clinical Study Report");
    assert_eq!(node.metadata.drug.as_deref(), Some("ION-582"));
    assert_eq!(
        consumer.load_state("documents/Module 5/Efficacy/101"),
        Some(LoadState::Unloaded)
    );
    assert!(fetcher.calls() >= 1);
}

#[tokio::test]
async fn open_reads_written_index_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    seed_submission(temp_dir.path());
    let config = config_for(temp_dir.path(), Some(200));
    IndexWriter::from_config(&config)
        .write(&build(temp_dir.path(), Some(200)))
        .unwrap();

    let consumer = IndexConsumer::open(&config).await.unwrap();
    assert!(matches!(
        consumer.expand(STUDY).await,
        Err(ApiError::PathNotFound(_))
    ));
    consumer.reveal(STUDY).await.unwrap();
    assert_eq!(consumer.load_state(STUDY), Some(LoadState::Loaded));
    assert!(consumer.node(&format!("{STUDY}/csr.pdf")).is_some());
}
