//! Watch daemon and runtime logic.

use super::events::{ChangeEvent, EventBatcher, WatchConfig};
use crate::config::IndexConfig;
use crate::error::ApiError;
use crate::tree::{BuildReport, IndexBuilder, IndexWriter, WriteSummary};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Rebuilds and rewrites the index whenever the document tree changes
pub struct WatchDaemon {
    config: IndexConfig,
    watch: WatchConfig,
    running: Arc<RwLock<bool>>,
}

impl WatchDaemon {
    /// `config` must have its paths resolved.
    pub fn new(config: IndexConfig, watch: WatchConfig) -> Self {
        Self {
            config,
            watch,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run until stopped or the watcher disconnects.
    pub fn start(&self) -> Result<(), ApiError> {
        *self.running.write() = true;

        self.rebuild()?;
        info!("Initial index built");

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Err(e) = tx.send(res) {
                error!("Error sending watch event: {}", e);
            }
        })
        .map_err(|e| watch_error("Failed to create watcher", e))?;

        watcher
            .watch(&self.watch.documents_dir, RecursiveMode::Recursive)
            .map_err(|e| watch_error("Failed to watch directory", e))?;

        info!(documents = ?self.watch.documents_dir, "Watching document tree");

        let mut batcher = EventBatcher::new(self.watch.clone());
        let batch_window = self.watch.batch_window();
        let mut last_batch_time = Instant::now();

        while *self.running.read() {
            let timeout = batch_window
                .saturating_sub(last_batch_time.elapsed())
                .max(Duration::from_millis(10));
            match rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    for change in convert_event(event) {
                        if batcher.add_event(change) {
                            self.process_events(batcher.take_batch());
                            last_batch_time = Instant::now();
                        }
                    }
                }
                Ok(Err(e)) => warn!("Watch error: {}", e),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watcher channel disconnected");
                    break;
                }
            }

            if !batcher.is_empty() && last_batch_time.elapsed() >= batch_window {
                self.process_events(batcher.take_batch());
                last_batch_time = Instant::now();
            }
        }

        Ok(())
    }

    pub fn stop(&self) {
        *self.running.write() = false;
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Build and write the whole index once.
    pub fn rebuild(&self) -> Result<(BuildReport, WriteSummary), ApiError> {
        let output = IndexBuilder::from_config(&self.config).build(&self.config.archive.documents_dir)?;
        let summary = IndexWriter::from_config(&self.config).write(&output)?;
        Ok((output.report, summary))
    }

    fn process_events(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            debug!(path = %event.path().display(), "Change detected");
        }
        info!(changes = events.len(), "Rebuilding index");
        match self.rebuild() {
            Ok((report, _)) => info!(
                folders = report.folders,
                files = report.files,
                warnings = report.warnings.len(),
                "Index rebuilt"
            ),
            Err(e) => error!(error = %e, "Index rebuild failed"),
        }
    }
}

fn watch_error(context: &str, e: notify::Error) -> ApiError {
    ApiError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, e),
    ))
}

fn convert_event(event: Event) -> Vec<ChangeEvent> {
    let mut paths = event.paths.into_iter();
    match event.kind {
        EventKind::Create(_) => paths.map(ChangeEvent::Created).collect(),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
            let first = paths.next();
            match (first, paths.next()) {
                (Some(from), Some(to)) => vec![ChangeEvent::Renamed { from, to }],
                (Some(path), None) => vec![ChangeEvent::Modified(path)],
                _ => Vec::new(),
            }
        }
        EventKind::Modify(_) => paths.map(ChangeEvent::Modified).collect(),
        EventKind::Remove(_) => paths.map(ChangeEvent::Removed).collect(),
        _ => Vec::new(),
    }
}
