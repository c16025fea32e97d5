//! Source watching: discovery, write-completion detection and relay.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!   - One SourceWorker task per configured source
//!   - Shared CancellationToken for shutdown
//!         |
//!    SourceWorker (per tick)
//!      list_candidates -> SourceTracker::reconcile
//!         |
//!      for each unhandled file, oldest first:
//!      StabilityDetector -> RecordParser -> DeliveryClient -> SourceTracker::mark
//! ```
//!
//! Files present at startup are marked without being relayed (baseline).

mod error;
mod notifier;
mod orchestrator;
mod scan;
mod source;
mod stability;
mod tracker;
mod worker;

pub use error::WatchError;
pub use notifier::DirectoryNotifier;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use scan::{Candidate, list_candidates, matches_extension};
pub use source::Source;
pub use stability::{
    FileObservation, FileSample, StabilityDetector, StabilityPolicy, StabilityVerdict,
};
pub use tracker::SourceTracker;
pub use worker::{FileDisposition, SourceWorker, TickReport};
