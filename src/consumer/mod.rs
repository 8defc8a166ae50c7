//! Index consumer
//!
//! Holds the loaded portion of the index and the navigation state on top of
//! it: which folders are expanded and what the current query matches.
//! Unloaded folders are fetched on demand, one fetch per path no matter how
//! many callers ask for it at once.
//!
//! State lives behind a short-held mutex that is never held across an
//! `.await`. A fetched fragment is spliced in under the same lock that
//! publishes the result to joined callers.

pub mod fetch;
pub mod search;

pub use fetch::{validate_fragment, FragmentFetcher, FsFragmentFetcher, HttpFragmentFetcher};
pub use search::SearchState;

use crate::concurrency::{Claim, FetchGuard, FetchIntent, FetchStatus, InFlightFetches};
use crate::config::IndexConfig;
use crate::error::{ApiError, FetchError};
use crate::tree::{DocumentNode, NodeKind, StoredContents};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Load state of a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// What the presentation layer should do with a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Expansion state of a path after an Expand call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpandOutcome {
    Expanded,
    Collapsed,
}

/// One visible row, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub path: String,
    pub name: String,
    pub title: String,
    pub kind: NodeKind,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_state: Option<LoadState>,
    pub expanded: bool,
    pub matched: bool,
}

#[derive(Debug)]
struct ConsumerState {
    tree: DocumentNode,
    expanded: BTreeSet<String>,
    search: SearchState,
}

impl ConsumerState {
    fn toggle(&mut self, path: &str) -> ExpandOutcome {
        if self.expanded.remove(path) {
            ExpandOutcome::Collapsed
        } else {
            self.expanded.insert(path.to_string());
            ExpandOutcome::Expanded
        }
    }

    fn outcome(&self, path: &str) -> ExpandOutcome {
        if self.expanded.contains(path) {
            ExpandOutcome::Expanded
        } else {
            ExpandOutcome::Collapsed
        }
    }

    fn visibility(&self, path: &str) -> Option<Visibility> {
        if path == self.tree.path {
            return Some(Visibility::Visible);
        }
        let ancestors = self.tree.ancestor_paths(path)?;
        if !ancestors.iter().all(|a| self.expanded.contains(a)) {
            return Some(Visibility::Hidden);
        }
        if self.search.is_active() {
            let related = self.search.matches.contains(path)
                || self.search.match_ancestors.contains(path)
                || ancestors.iter().any(|a| self.search.matches.contains(a));
            if !related {
                return Some(Visibility::Hidden);
            }
        }
        Some(Visibility::Visible)
    }
}

/// Navigable view over a lazily loaded index
#[derive(Clone)]
pub struct IndexConsumer {
    state: Arc<Mutex<ConsumerState>>,
    fetcher: Arc<dyn FragmentFetcher>,
    in_flight: InFlightFetches,
}

impl IndexConsumer {
    /// Consumer over `index` with nothing expanded and no query.
    pub fn new(index: DocumentNode, fetcher: Arc<dyn FragmentFetcher>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConsumerState {
                tree: index,
                expanded: BTreeSet::new(),
                search: SearchState::default(),
            })),
            fetcher,
            in_flight: InFlightFetches::new(),
        }
    }

    /// Consumer reading the top-level index and fetching fragments the way
    /// `config` says: over HTTP when `fetch.base_url` is set, otherwise from
    /// the output directory.
    pub async fn open(config: &IndexConfig) -> Result<Self, ApiError> {
        let fragment_file = config.output.fragment_file.clone();
        let (index, fetcher): (DocumentNode, Arc<dyn FragmentFetcher>) =
            match &config.fetch.base_url {
                Some(base_url) => {
                    let fetcher =
                        HttpFragmentFetcher::new(base_url, fragment_file, config.fetch.timeout())
                            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
                    let index = fetch_index(base_url, &config.output.index_file, config).await?;
                    (index, Arc::new(fetcher))
                }
                None => {
                    let path = config.output.output_dir.join(&config.output.index_file);
                    let bytes = tokio::fs::read(&path).await?;
                    let index: DocumentNode = serde_json::from_slice(&bytes)?;
                    let fetcher = FsFragmentFetcher::new(&config.output.output_dir, fragment_file);
                    (index, Arc::new(fetcher))
                }
            };
        info!(root = %index.path, nodes = index.loaded_count(), "Index opened");
        Ok(Self::new(index, fetcher))
    }

    /// Clone of the loaded tree.
    pub fn snapshot(&self) -> DocumentNode {
        self.state.lock().tree.clone()
    }

    /// Clone of one loaded node.
    pub fn node(&self, path: &str) -> Option<DocumentNode> {
        self.state.lock().tree.find(path).cloned()
    }

    pub fn root_path(&self) -> String {
        self.state.lock().tree.path.clone()
    }

    pub fn expanded_paths(&self) -> BTreeSet<String> {
        self.state.lock().expanded.clone()
    }

    pub fn search_state(&self) -> SearchState {
        self.state.lock().search.clone()
    }

    /// Load state of a folder; `None` for files and unknown paths.
    pub fn load_state(&self, path: &str) -> Option<LoadState> {
        let state = self.state.lock();
        let node = state.tree.find(path)?;
        if !node.kind.is_folder() {
            return None;
        }
        Some(self.load_state_of(node))
    }

    fn load_state_of(&self, node: &DocumentNode) -> LoadState {
        match node.contents() {
            Some(StoredContents::Unloaded { .. }) if self.in_flight.is_in_flight(&node.path) => {
                LoadState::Loading
            }
            Some(StoredContents::Unloaded { .. }) => LoadState::Unloaded,
            _ => LoadState::Loaded,
        }
    }

    /// Visibility of a loaded node; `None` if the path is not loaded.
    pub fn visibility(&self, path: &str) -> Option<Visibility> {
        self.state.lock().visibility(path)
    }

    /// Toggle a folder, loading its fragment first when needed.
    ///
    /// A call that arrives while the folder is already loading waits for that
    /// fetch. It toggles only if no other Expand is going to: a second Expand
    /// on the same fetch reports the resulting state without toggling again,
    /// while an Expand joining a reveal or load-all toggles once loaded. A
    /// failed fetch changes nothing and can be retried.
    pub async fn expand(&self, path: &str) -> Result<ExpandOutcome, ApiError> {
        let (claim, fragment_ref) = {
            let mut state = self.state.lock();
            let node = state
                .tree
                .find(path)
                .ok_or_else(|| ApiError::PathNotFound(path.to_string()))?;
            if !node.kind.is_folder() {
                return Err(ApiError::NotAFolder(path.to_string()));
            }
            let unloaded = match node.contents() {
                Some(StoredContents::Unloaded { fragment_ref }) => Some(fragment_ref.to_string()),
                _ => None,
            };
            match unloaded {
                Some(fragment_ref) => {
                    (self.in_flight.begin(path, FetchIntent::Expand), fragment_ref)
                }
                None => return Ok(state.toggle(path)),
            }
        };

        match claim {
            Claim::Leader(guard) => {
                self.load(guard, &fragment_ref, |state, path| state.toggle(path))
                    .await
            }
            Claim::Follower(waiter) => {
                let toggles = waiter.toggles();
                debug!(path, toggles, "Joining in-flight fetch");
                waiter
                    .wait()
                    .await
                    .map_err(|source| ApiError::FragmentUnavailable {
                        fragment_ref,
                        source,
                    })?;
                let mut state = self.state.lock();
                if toggles {
                    Ok(state.toggle(path))
                } else {
                    Ok(state.outcome(path))
                }
            }
        }
    }

    /// Fetch, validate and splice one fragment, then run `on_loaded` under
    /// the same lock before joined callers are released.
    async fn load<R>(
        &self,
        guard: FetchGuard,
        fragment_ref: &str,
        on_loaded: impl FnOnce(&mut ConsumerState, &str) -> R,
    ) -> Result<R, ApiError> {
        let fetched = self
            .fetcher
            .fetch(fragment_ref)
            .await
            .and_then(|fragment| validate_fragment(fragment_ref, &fragment).map(|_| fragment));

        let mut state = self.state.lock();
        let fragment = match fetched {
            Ok(fragment) => fragment,
            Err(source) => {
                warn!(fragment_ref, error = %source, "Fragment fetch failed");
                guard.finish(FetchStatus::Failed(source.to_string()));
                return Err(ApiError::FragmentUnavailable {
                    fragment_ref: fragment_ref.to_string(),
                    source,
                });
            }
        };

        let path = guard.path().to_string();
        let node = match state.tree.find_mut(&path) {
            Some(node) => node,
            None => {
                guard.finish(FetchStatus::Failed(format!("{path} left the loaded tree")));
                return Err(ApiError::PathNotFound(path));
            }
        };
        node.children = fragment.children;
        node.fragment_ref = None;

        if state.search.is_active() {
            let query = state.search.query.clone();
            state.search = SearchState::compute(&state.tree, &query);
        }
        let result = on_loaded(&mut *state, &path);
        guard.finish(FetchStatus::Loaded);
        info!(path = %path, "Fragment loaded");
        Ok(result)
    }

    /// Wait for or perform the load of one unloaded folder.
    async fn ensure_loaded(&self, path: &str, fragment_ref: &str) -> Result<bool, ApiError> {
        let claim = {
            let state = self.state.lock();
            match state.tree.find(path).and_then(|n| n.contents()) {
                Some(StoredContents::Unloaded { .. }) => {
                    self.in_flight.begin(path, FetchIntent::Load)
                }
                _ => return Ok(false),
            }
        };
        match claim {
            Claim::Leader(guard) => self.load(guard, fragment_ref, |_, _| true).await,
            Claim::Follower(waiter) => {
                waiter
                    .wait()
                    .await
                    .map_err(|source| ApiError::FragmentUnavailable {
                        fragment_ref: fragment_ref.to_string(),
                        source,
                    })?;
                Ok(false)
            }
        }
    }

    /// Recompute matches for `query` over the loaded tree and expand every
    /// match's ancestors. An empty query clears the matches and leaves the
    /// expanded set alone. Never fetches.
    pub fn search(&self, query: &str) -> BTreeSet<String> {
        let mut state = self.state.lock();
        let search = SearchState::compute(&state.tree, query);
        if search.is_active() {
            state.expanded.extend(search.match_ancestors.iter().cloned());
        }
        let matches = search.matches.clone();
        debug!(query, matches = matches.len(), "Search updated");
        state.search = search;
        matches
    }

    /// Load every folder on the way to `path` and expand its ancestors.
    pub async fn reveal(&self, path: &str) -> Result<DocumentNode, ApiError> {
        loop {
            let pending = {
                let mut state = self.state.lock();
                let deepest = state
                    .tree
                    .deepest_loaded(path)
                    .ok_or_else(|| ApiError::PathNotFound(path.to_string()))?;
                if deepest.path == path {
                    let node = deepest.clone();
                    let ancestors = state.tree.ancestor_paths(path).unwrap_or_default();
                    state.expanded.extend(ancestors);
                    return Ok(node);
                }
                match deepest.contents() {
                    Some(StoredContents::Unloaded { fragment_ref }) => {
                        (deepest.path.clone(), fragment_ref.to_string())
                    }
                    _ => return Err(ApiError::PathNotFound(path.to_string())),
                }
            };
            self.ensure_loaded(&pending.0, &pending.1).await?;
        }
    }

    /// Fetch every fragment reachable from the loaded tree. Returns the
    /// number of fragments this call fetched.
    pub async fn load_all(&self) -> Result<usize, ApiError> {
        let mut fetched = 0;
        loop {
            let pending = {
                let state = self.state.lock();
                let mut pending = Vec::new();
                state.tree.walk(&mut |node, _| {
                    if let Some(StoredContents::Unloaded { fragment_ref }) = node.contents() {
                        pending.push((node.path.clone(), fragment_ref.to_string()));
                    }
                });
                pending
            };
            if pending.is_empty() {
                info!(fetched, "All fragments loaded");
                return Ok(fetched);
            }
            for (path, fragment_ref) in pending {
                if self.ensure_loaded(&path, &fragment_ref).await? {
                    fetched += 1;
                }
            }
        }
    }

    /// Visible nodes in display order.
    pub fn rows(&self) -> Vec<Row> {
        let state = self.state.lock();
        let mut rows = Vec::new();
        self.collect_rows(&*state, &state.tree, 0, false, &mut rows);
        rows
    }

    fn collect_rows(
        &self,
        state: &ConsumerState,
        node: &DocumentNode,
        depth: usize,
        under_match: bool,
        rows: &mut Vec<Row>,
    ) {
        let matched = state.search.matches.contains(&node.path);
        if depth > 0 && state.search.is_active() {
            let related = matched || under_match || state.search.match_ancestors.contains(&node.path);
            if !related {
                return;
            }
        }
        let expanded = state.expanded.contains(&node.path);
        rows.push(Row {
            path: node.path.clone(),
            name: node.name.clone(),
            title: node.metadata.title.clone(),
            kind: node.kind,
            depth,
            load_state: node.kind.is_folder().then(|| self.load_state_of(node)),
            expanded,
            matched,
        });
        if expanded {
            for child in node.loaded_children() {
                self.collect_rows(state, child, depth + 1, under_match || matched, rows);
            }
        }
    }
}

async fn fetch_index(
    base_url: &str,
    index_file: &str,
    config: &IndexConfig,
) -> Result<DocumentNode, ApiError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), index_file);
    let to_api = |source: FetchError| ApiError::FragmentUnavailable {
        fragment_ref: url.clone(),
        source,
    };
    let client = reqwest::Client::builder()
        .timeout(config.fetch.timeout())
        .build()
        .map_err(|e| to_api(e.into()))?;
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| to_api(e.into()))?;
    if !response.status().is_success() {
        return Err(to_api(FetchError::HttpStatus {
            url: url.clone(),
            status: response.status().as_u16(),
        }));
    }
    let bytes = response.bytes().await.map_err(|e| to_api(e.into()))?;
    serde_json::from_slice(&bytes).map_err(|e| to_api(e.into()))
}
