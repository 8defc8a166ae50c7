//! In-flight fragment fetches
//!
//! At most one fetch runs per fragment path. The first caller to claim a path
//! becomes the leader and performs the fetch; later callers get a waiter on
//! the leader's result. The claim is released when the leader finishes or its
//! guard is dropped, which is what returns an abandoned fetch to `Unloaded`.
//!
//! Each claim also records who toggles the folder once it is loaded. An
//! Expand toggles exactly once per fetch: a leading Expand does it itself,
//! otherwise the first Expand to join a plain load takes it over.

use crate::error::FetchError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Result broadcast to waiters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Pending,
    Loaded,
    Failed(String),
}

/// Why a caller wants a folder loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchIntent {
    /// Load, then toggle the folder's expansion
    Expand,
    /// Load only (reveal, load-all)
    Load,
}

#[derive(Debug)]
struct InFlight {
    sender: watch::Sender<FetchStatus>,
    toggle_claimed: bool,
}

type Registry = Arc<Mutex<HashMap<String, InFlight>>>;

/// Per-path registry of fetches currently running
#[derive(Debug, Clone, Default)]
pub struct InFlightFetches {
    entries: Registry,
}

/// Outcome of claiming a path
#[derive(Debug)]
pub enum Claim {
    /// Caller must fetch and then call `FetchGuard::finish`
    Leader(FetchGuard),
    /// A fetch is already running; wait on it
    Follower(FetchWaiter),
}

impl InFlightFetches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`, or join the fetch already running for it.
    pub fn begin(&self, path: &str, intent: FetchIntent) -> Claim {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(path) {
            let toggles = intent == FetchIntent::Expand && !entry.toggle_claimed;
            entry.toggle_claimed |= toggles;
            return Claim::Follower(FetchWaiter {
                receiver: entry.sender.subscribe(),
                toggles,
            });
        }
        let (sender, _) = watch::channel(FetchStatus::Pending);
        entries.insert(
            path.to_string(),
            InFlight {
                sender,
                toggle_claimed: intent == FetchIntent::Expand,
            },
        );
        Claim::Leader(FetchGuard {
            path: path.to_string(),
            entries: Arc::clone(&self.entries),
            finished: false,
        })
    }

    pub fn is_in_flight(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Leader's claim on a path
#[derive(Debug)]
pub struct FetchGuard {
    path: String,
    entries: Registry,
    finished: bool,
}

impl FetchGuard {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Release the claim and publish the result to every waiter.
    pub fn finish(mut self, status: FetchStatus) {
        self.release(status);
        self.finished = true;
    }

    fn release(&self, status: FetchStatus) {
        if let Some(entry) = self.entries.lock().remove(&self.path) {
            entry.sender.send_replace(status);
        }
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(path = %self.path, "Fetch abandoned before completion");
            self.release(FetchStatus::Failed(FetchError::Abandoned.to_string()));
        }
    }
}

/// Follower's handle on another caller's fetch
#[derive(Debug)]
pub struct FetchWaiter {
    receiver: watch::Receiver<FetchStatus>,
    toggles: bool,
}

impl FetchWaiter {
    /// Whether this waiter, not the leader, toggles the folder after loading.
    pub fn toggles(&self) -> bool {
        self.toggles
    }

    /// Wait for the leader to finish.
    pub async fn wait(mut self) -> Result<(), FetchError> {
        loop {
            let status = self.receiver.borrow_and_update().clone();
            match status {
                FetchStatus::Loaded => return Ok(()),
                FetchStatus::Failed(reason) => return Err(FetchError::Joined(reason)),
                FetchStatus::Pending => {}
            }
            if self.receiver.changed().await.is_err() {
                let status = self.receiver.borrow().clone();
                return match status {
                    FetchStatus::Loaded => Ok(()),
                    FetchStatus::Failed(reason) => Err(FetchError::Joined(reason)),
                    FetchStatus::Pending => Err(FetchError::Abandoned),
                };
            }
        }
    }
}
