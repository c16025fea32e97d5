//! A configured monitoring target and its handled-file state.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, SourceConfig};
use crate::delivery::Endpoint;

use super::tracker::SourceTracker;

/// One watched directory paired with its NVR endpoints.
///
/// Owns its [`SourceTracker`]; nothing else mutates it.
#[derive(Debug)]
pub struct Source {
    id: String,
    dir: PathBuf,
    extension: String,
    primary: Endpoint,
    fallback: Option<Endpoint>,
    tracker: SourceTracker,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        dir: impl Into<PathBuf>,
        primary: Endpoint,
        fallback: Option<Endpoint>,
    ) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
            extension: "xml".to_string(),
            primary,
            fallback,
            tracker: SourceTracker::new(),
        }
    }

    /// Build a source from its settings entry, validating the addresses.
    pub fn from_config(id: &str, config: &SourceConfig) -> Result<Self, ConfigError> {
        let (primary, fallback) = config.endpoints(id)?;
        Ok(Self::new(id, &config.path, primary, fallback).with_extension(&config.extension))
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn primary(&self) -> &Endpoint {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Endpoint> {
        self.fallback.as_ref()
    }

    pub fn tracker(&self) -> &SourceTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut SourceTracker {
        &mut self.tracker
    }

    /// `10.0.0.1:9000` or `10.0.0.1:9000 -> fallback 10.0.0.1:9001`.
    pub fn route_description(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!("{} -> fallback {fallback}", self.primary),
            None => self.primary.to_string(),
        }
    }
}
