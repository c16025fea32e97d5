//! Watch loop for a single source.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{DeliveryConfig, PollingConfig};
use crate::delivery::{DeliveryClient, DeliveryOutcome, Transport};
use crate::record::{ParseError, Record, RecordParser};
use crate::utils::sleep_or_cancel;

use super::WatchError;
use super::notifier::DirectoryNotifier;
use super::scan::list_candidates;
use super::source::Source;
use super::stability::{StabilityDetector, StabilityPolicy, StabilityVerdict};

/// What happened to one new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    /// Parsed and handed to the delivery client.
    Relayed(DeliveryOutcome),
    /// Could not be read or parsed; skipped for good.
    Rejected,
    /// Shutdown arrived first; the file stays unhandled.
    Interrupted,
}

/// Counters for one pass over a source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Handled paths forgotten because the file is gone.
    pub pruned: usize,
    pub delivered: usize,
    pub undelivered: usize,
    pub rejected: usize,
    /// The pass stopped early for shutdown.
    pub interrupted: bool,
}

impl TickReport {
    /// Files marked handled during this pass.
    pub fn handled(&self) -> usize {
        self.delivered + self.undelivered + self.rejected
    }

    fn record(&mut self, disposition: FileDisposition) {
        match disposition {
            FileDisposition::Relayed(outcome) if outcome.is_delivered() => self.delivered += 1,
            FileDisposition::Relayed(_) => self.undelivered += 1,
            FileDisposition::Rejected => self.rejected += 1,
            FileDisposition::Interrupted => self.interrupted = true,
        }
    }
}

/// Drives discovery, stability, parsing and delivery for one source.
///
/// Each worker exclusively owns its [`Source`] and therefore its tracker.
/// Files are handled one at a time, oldest first.
pub struct SourceWorker {
    source: Source,
    detector: StabilityDetector,
    parser: RecordParser,
    client: DeliveryClient,
    tick: Duration,
    watch_changes: bool,
    notifier: Option<DirectoryNotifier>,
    dir_missing: bool,
    cancel: CancellationToken,
}

impl SourceWorker {
    pub fn with_transport(
        source: Source,
        polling: &PollingConfig,
        delivery: &DeliveryConfig,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Self {
        let client = DeliveryClient::with_transport(
            source.id(),
            source.primary().clone(),
            source.fallback().cloned(),
            delivery,
            transport,
            cancel.clone(),
        );

        Self {
            parser: RecordParser::new(source.id()),
            detector: StabilityDetector::new(StabilityPolicy::from(polling)),
            client,
            tick: polling.tick(),
            watch_changes: false,
            notifier: None,
            dir_missing: false,
            source,
            cancel,
        }
    }

    /// Wake early on directory change notifications.
    pub fn watch_changes(mut self, enabled: bool) -> Self {
        self.watch_changes = enabled;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Mark every file already present as handled without relaying it.
    ///
    /// Returns the number of files skipped. A missing directory is not an
    /// error here; the source is retried on every tick.
    pub async fn baseline(&mut self) -> usize {
        match list_candidates(self.source.dir(), self.source.extension()).await {
            Ok(candidates) => {
                let count = candidates.len();
                let tracker = self.source.tracker_mut();
                for candidate in candidates {
                    tracker.mark(candidate.path);
                }
                crate::log_event!(self.source.id(), "baseline", "{count} existing files skipped");
                count
            }
            Err(WatchError::DirectoryMissing { path }) => {
                tracing::warn!(
                    "[{}] watch directory not found: {}",
                    self.source.id(),
                    path.display()
                );
                self.dir_missing = true;
                0
            }
            Err(e) => {
                tracing::error!("[{}] baseline failed: {e}", self.source.id());
                0
            }
        }
    }

    /// One pass: prune the tracker, then relay every unhandled file in order.
    ///
    /// A file is marked handled whatever its outcome, so a poison file is
    /// never retried. Only a shutdown leaves a file unmarked.
    pub async fn tick(&mut self) -> Result<TickReport, WatchError> {
        self.ensure_notifier();

        let candidates = match list_candidates(self.source.dir(), self.source.extension()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                if matches!(e, WatchError::DirectoryMissing { .. }) {
                    self.notifier = None;
                }
                return Err(e);
            }
        };

        let mut report = TickReport {
            pruned: self
                .source
                .tracker_mut()
                .reconcile(candidates.iter().map(|c| c.path.as_path())),
            ..TickReport::default()
        };
        if report.pruned > 0 {
            crate::debug_event!(self.source.id(), "pruned", "{}", report.pruned);
        }

        for candidate in candidates {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            if self.source.tracker().is_handled(&candidate.path) {
                continue;
            }

            crate::log_event!(self.source.id(), "new file", "{}", file_label(&candidate.path));

            let disposition = self.process_file(&candidate.path).await;
            report.record(disposition);
            if disposition == FileDisposition::Interrupted {
                break;
            }

            self.source.tracker_mut().mark(candidate.path);
        }

        Ok(report)
    }

    /// Stability, then parse, then deliver.
    async fn process_file(&self, path: &Path) -> FileDisposition {
        let id = self.source.id();

        match self.detector.wait(path, &self.cancel).await {
            StabilityVerdict::Stable => {}
            StabilityVerdict::TimedOut => {
                // A half-written file may parse with defaulted fields; that
                // beats dropping the deposit.
                tracing::warn!(
                    "[{id}] {} did not settle within {}ms, reading anyway",
                    file_label(path),
                    self.detector.policy().timeout.as_millis()
                );
            }
            StabilityVerdict::Cancelled => return FileDisposition::Interrupted,
        }

        let record = match self.parse_isolated(path).await {
            Ok(record) => record,
            Err(e) if e.is_structural() => {
                tracing::warn!("[{id}] skipping {}: {e}", file_label(path));
                return FileDisposition::Rejected;
            }
            Err(e) => {
                tracing::error!("[{id}] {e}");
                return FileDisposition::Rejected;
            }
        };

        let message = record.to_message();
        crate::debug_event!(id, "message", "{message:?}");

        FileDisposition::Relayed(self.client.deliver(&message).await)
    }

    /// Parse on the blocking pool so a parser panic costs one file, not the source.
    async fn parse_isolated(&self, path: &Path) -> Result<Record, ParseError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let parser = self.parser.clone();
        match tokio::task::spawn_blocking(move || parser.parse_bytes(&bytes)).await {
            Ok(result) => result,
            Err(e) => Err(ParseError::Structural {
                reason: format!("parser aborted: {e}"),
            }),
        }
    }

    /// Tick until cancelled. Errors are logged and never end the loop.
    pub async fn run(mut self) {
        crate::debug_event!(self.source.id(), "worker started");

        while !self.cancel.is_cancelled() {
            match self.tick().await {
                Ok(report) => {
                    if self.dir_missing {
                        crate::log_event!(self.source.id(), "directory available");
                        self.dir_missing = false;
                    }
                    if report.handled() > 0 {
                        crate::debug_event!(self.source.id(), "tick", "{report:?}");
                    }
                }
                Err(WatchError::DirectoryMissing { path }) => {
                    if !self.dir_missing {
                        tracing::warn!(
                            "[{}] watch directory not found: {}",
                            self.source.id(),
                            path.display()
                        );
                        self.dir_missing = true;
                    }
                }
                Err(e) => {
                    tracing::error!("[{}] monitoring error: {e}", self.source.id());
                }
            }

            if !self.wait_for_next_tick().await {
                break;
            }
        }

        crate::log_event!(self.source.id(), "stopped");
    }

    async fn wait_for_next_tick(&self) -> bool {
        match &self.notifier {
            Some(notifier) => tokio::select! {
                _ = tokio::time::sleep(self.tick) => true,
                _ = notifier.changed() => true,
                _ = self.cancel.cancelled() => false,
            },
            None => sleep_or_cancel(self.tick, &self.cancel).await,
        }
    }

    fn ensure_notifier(&mut self) {
        if !self.watch_changes || self.notifier.is_some() || !self.source.dir().is_dir() {
            return;
        }

        match DirectoryNotifier::watch(self.source.dir(), self.source.extension()) {
            Ok(notifier) => self.notifier = Some(notifier),
            Err(e) => {
                // Polling still covers the directory
                crate::debug_event!(self.source.id(), "notifications unavailable", "{e}");
            }
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
