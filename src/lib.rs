//! Relay deposit records written by banknote counting machines to a
//! monitoring service over TCP.
//!
//! Each configured source is a directory the machine writes XML reports to.
//! New reports are detected, allowed to settle, parsed into a [`Record`] and
//! sent as a short text message to the source's primary endpoint, falling
//! back to a secondary endpoint when the primary is unreachable.

pub mod cli;
pub mod config;
pub mod delivery;
pub mod logging;
pub mod record;
pub mod utils;
pub mod watcher;

pub use config::{ConfigError, Settings, SourceConfig};
pub use delivery::{DeliveryClient, DeliveryError, DeliveryOutcome, Endpoint, TcpTransport, Transport};
pub use record::{DenominationCount, ParseError, Record, RecordParser};
pub use watcher::{Orchestrator, Source, SourceTracker, StabilityDetector, WatchError};
