//! Optional OS change notifications used to wake a source between ticks.
//!
//! A notification only shortens the wait for the next scan. It says nothing
//! about whether the writer is done, so every file still goes through
//! stability detection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::Notify;

use super::WatchError;
use super::scan::matches_extension;

/// Watches one directory and signals when a matching file is created or written.
pub struct DirectoryNotifier {
    dir: PathBuf,
    wake: Arc<Notify>,
    // Only held to keep the OS watch alive; the mutex makes the notifier Sync
    _watcher: Mutex<notify::RecommendedWatcher>,
}

impl DirectoryNotifier {
    pub fn watch(dir: &Path, extension: &str) -> Result<Self, WatchError> {
        let wake = Arc::new(Notify::new());
        let signal = wake.clone();
        let extension = extension.to_string();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let relevant = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_)
                ) && event
                    .paths
                    .iter()
                    .any(|p| matches_extension(p, &extension));
                if relevant {
                    // Stores a permit if the worker is busy, so the change is not lost
                    signal.notify_one();
                }
            }
            Err(e) => {
                tracing::debug!("[notifier] file watch error: {e}");
            }
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("notifier", "watching", "{}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            wake,
            _watcher: Mutex::new(watcher),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve on the next relevant change, or at once if one is pending.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }
}

impl std::fmt::Debug for DirectoryNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryNotifier")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}
