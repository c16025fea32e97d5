//! Runs one watch loop per configured source.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::delivery::{TcpTransport, Transport};

use super::WatchError;
use super::source::Source;
use super::worker::SourceWorker;

/// Owns every source worker and their shared shutdown token.
///
/// Sources never share state: each worker runs as its own task with its own
/// tick cadence, so a slow endpoint or a broken directory only delays the
/// source it belongs to.
pub struct Orchestrator {
    workers: Vec<SourceWorker>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create a builder for configuring the orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Sources in configuration order.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.workers.iter().map(SourceWorker::source)
    }

    /// Token that stops every worker when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mark every file already on disk as handled. Returns the total skipped.
    pub async fn baseline(&mut self) -> usize {
        let mut total = 0;
        for worker in &mut self.workers {
            total += worker.baseline().await;
        }
        total
    }

    /// Run all sources until the cancel token fires.
    ///
    /// A worker that panics is logged; the remaining workers keep running.
    pub async fn run(self) {
        let mut tasks = JoinSet::new();
        for worker in self.workers {
            let id = worker.source().id().to_string();
            tasks.spawn(async move {
                worker.run().await;
                id
            });
        }

        crate::log_event!("relay", "started", "{} sources", tasks.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(id) => crate::debug_event!("relay", "worker finished", "{id}"),
                Err(e) if e.is_panic() => {
                    tracing::error!("[relay] source worker panicked: {e}");
                }
                Err(e) => tracing::warn!("[relay] source worker aborted: {e}"),
            }
        }

        crate::log_event!("relay", "stopped");
    }
}

/// Builder for constructing an Orchestrator.
pub struct OrchestratorBuilder {
    settings: Option<Settings>,
    transport: Option<Arc<dyn Transport>>,
    cancel: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            settings: None,
            transport: None,
            cancel: None,
        }
    }

    /// Set the settings holding the source table and tunables.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the TCP transport (used by tests).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing shutdown token.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the Orchestrator.
    pub fn build(self) -> Result<Orchestrator, WatchError> {
        let settings = self.settings.ok_or_else(|| WatchError::InitFailed {
            reason: "Settings are required".to_string(),
        })?;
        settings.validate()?;

        let cancel = self.cancel.unwrap_or_default();
        let transport: Arc<dyn Transport> = self
            .transport
            .unwrap_or_else(|| Arc::new(TcpTransport::new(settings.delivery.timeout())));

        let mut workers = Vec::with_capacity(settings.sources.len());
        for (id, config) in &settings.sources {
            let source = Source::from_config(id, config)?;
            let worker = SourceWorker::with_transport(
                source,
                &settings.polling,
                &settings.delivery,
                transport.clone(),
                cancel.child_token(),
            )
            .watch_changes(settings.file_watch.enabled);
            workers.push(worker);
        }

        Ok(Orchestrator { workers, cancel })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
