//! Error types for endpoint delivery.

use thiserror::Error;

use super::Endpoint;

/// Failure of a single transmission attempt.
///
/// These never leave [`DeliveryClient::deliver`](super::DeliveryClient::deliver);
/// they are logged and folded into a [`DeliveryOutcome`](super::DeliveryOutcome).
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid endpoint '{address}': {reason}")]
    InvalidEndpoint { address: String, reason: String },

    #[error("Connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to {endpoint} timed out after {timeout_ms}ms")]
    ConnectTimeout { endpoint: Endpoint, timeout_ms: u64 },

    #[error("Sending to {endpoint} failed: {source}")]
    Send {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("Sending to {endpoint} timed out after {timeout_ms}ms")]
    SendTimeout { endpoint: Endpoint, timeout_ms: u64 },
}
