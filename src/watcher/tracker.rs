//! Per-source record of handled files.
//!
//! A path is marked once it has been processed, whatever the outcome, so a
//! file is never relayed twice. Pruning against the live directory keeps the
//! set bounded by the directory size rather than by uptime.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Handled paths of a single source.
#[derive(Debug, Default)]
pub struct SourceTracker {
    handled: HashSet<PathBuf>,
}

impl SourceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path as handled. Returns `false` if it already was.
    pub fn mark(&mut self, path: impl Into<PathBuf>) -> bool {
        self.handled.insert(path.into())
    }

    /// Check if a path has been handled.
    pub fn is_handled(&self, path: &Path) -> bool {
        self.handled.contains(path)
    }

    /// Forget every handled path that is not in `present`.
    ///
    /// Returns how many paths were dropped. A file recreated later under a
    /// dropped path is treated as new.
    pub fn reconcile<'a>(&mut self, present: impl IntoIterator<Item = &'a Path>) -> usize {
        let present: HashSet<&Path> = present.into_iter().collect();
        let before = self.handled.len();
        self.handled.retain(|p| present.contains(p.as_path()));
        before - self.handled.len()
    }

    /// Get count of handled paths.
    pub fn len(&self) -> usize {
        self.handled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handled.is_empty()
    }

    /// Get all handled paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.handled.iter().map(PathBuf::as_path)
    }
}
