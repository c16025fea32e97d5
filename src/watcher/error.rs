//! Error types for the source watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Watch directory {path} does not exist")]
    DirectoryMissing { path: PathBuf },

    #[error("Cannot list {path}: {reason}")]
    ListFailed { path: PathBuf, reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

impl From<crate::config::ConfigError> for WatchError {
    fn from(e: crate::config::ConfigError) -> Self {
        WatchError::ConfigError {
            reason: e.to_string(),
        }
    }
}
