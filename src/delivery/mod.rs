//! Best-effort delivery of overlay messages to NVR endpoints.
//!
//! Delivery is fire-and-forget: a message is written to a fresh TCP
//! connection which is closed immediately, and nothing is read back.
//! A failed primary attempt is retried once against the fallback endpoint
//! after a short delay. There is no queue; undelivered messages are dropped.

mod client;
mod endpoint;
mod error;

pub use client::{DeliveryClient, DeliveryOutcome, TcpTransport, Transport};
pub use endpoint::{Endpoint, EndpointRole};
pub use error::DeliveryError;
