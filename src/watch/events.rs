//! Watch events, batching, and configuration.

use crate::config::IndexConfig;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Watch mode configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory being watched
    pub documents_dir: PathBuf,
    /// Debounce window in milliseconds
    pub debounce_ms: u64,
    /// Batch window in milliseconds
    pub batch_window_ms: u64,
    /// Maximum events per batch
    pub max_batch_size: usize,
    /// File names whose changes never trigger a rebuild (generated output)
    pub ignored_names: BTreeSet<String>,
}

impl WatchConfig {
    pub fn from_index_config(config: &IndexConfig) -> Self {
        let ignored_names = [
            &config.output.index_file,
            &config.output.fragment_file,
            &config.output.markdown_file,
            &config.output.listing_file,
        ]
        .into_iter()
        .cloned()
        .chain([".DS_Store".to_string()])
        .collect();
        Self {
            documents_dir: config.archive.documents_dir.clone(),
            debounce_ms: config.watch.debounce_ms,
            batch_window_ms: config.watch.batch_window_ms,
            max_batch_size: 100,
            ignored_names,
        }
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::from_index_config(&IndexConfig::default())
    }
}

/// Filesystem change event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl ChangeEvent {
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Removed(p) => p,
            ChangeEvent::Renamed { to, .. } => to,
        }
    }
}

/// Event batcher for grouping and debouncing events
pub(crate) struct EventBatcher {
    config: WatchConfig,
    pending_events: HashMap<PathBuf, ChangeEvent>,
    last_event_time: HashMap<PathBuf, Instant>,
}

impl EventBatcher {
    pub(crate) fn new(config: WatchConfig) -> Self {
        Self {
            config,
            pending_events: HashMap::new(),
            last_event_time: HashMap::new(),
        }
    }

    /// Record an event. Returns `true` once the batch is full.
    pub(crate) fn add_event(&mut self, event: ChangeEvent) -> bool {
        let path = event.path().to_path_buf();
        if self.should_ignore(&path) {
            return false;
        }

        let now = Instant::now();
        let debounce_window = Duration::from_millis(self.config.debounce_ms);
        let within_debounce = self
            .last_event_time
            .get(&path)
            .map(|last| now.duration_since(*last) < debounce_window)
            .unwrap_or(false);

        self.pending_events.insert(path.clone(), event);
        if within_debounce {
            return false;
        }
        self.last_event_time.insert(path, now);
        self.pending_events.len() >= self.config.max_batch_size
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending_events.is_empty()
    }

    /// Drain pending events, sorted by path.
    pub(crate) fn take_batch(&mut self) -> Vec<ChangeEvent> {
        let mut events: Vec<_> = self.pending_events.drain().map(|(_, e)| e).collect();
        events.sort_by(|a, b| a.path().cmp(b.path()));
        self.last_event_time.clear();
        events
    }

    fn should_ignore(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return true,
        };
        self.config.ignored_names.contains(&*name)
            || name.ends_with(".tmp")
            || name.ends_with(".swp")
            || name.ends_with('~')
    }
}
