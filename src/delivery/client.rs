//! Primary/fallback delivery of overlay messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::DeliveryConfig;
use crate::utils::sleep_or_cancel;

use super::{DeliveryError, Endpoint, EndpointRole};

/// Result of delivering one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sent to the primary endpoint.
    Primary,
    /// Primary failed, sent to the fallback endpoint.
    Fallback,
    /// Nothing was sent. `fallback_attempted` is false when no fallback is configured.
    Undelivered { fallback_attempted: bool },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, DeliveryOutcome::Undelivered { .. })
    }

    /// Endpoint that accepted the message, if any.
    pub fn endpoint(&self) -> Option<EndpointRole> {
        match self {
            DeliveryOutcome::Primary => Some(EndpointRole::Primary),
            DeliveryOutcome::Fallback => Some(EndpointRole::Fallback),
            DeliveryOutcome::Undelivered { .. } => None,
        }
    }
}

/// Moves a payload to an endpoint.
///
/// Success means the connection was established and the whole payload written.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &Endpoint, payload: &[u8]) -> Result<(), DeliveryError>;
}

/// One short-lived TCP connection per message, closed right after the write.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, endpoint: &Endpoint, payload: &[u8]) -> Result<(), DeliveryError> {
        let timeout_ms = self.timeout.as_millis() as u64;

        let mut stream = match timeout(
            self.timeout,
            TcpStream::connect((endpoint.host(), endpoint.port())),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(DeliveryError::Connect {
                    endpoint: endpoint.clone(),
                    source: e,
                });
            }
            Err(_) => {
                return Err(DeliveryError::ConnectTimeout {
                    endpoint: endpoint.clone(),
                    timeout_ms,
                });
            }
        };

        let write = async {
            stream.write_all(payload).await?;
            stream.shutdown().await?;
            Ok::<_, std::io::Error>(())
        };

        match timeout(self.timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Send {
                endpoint: endpoint.clone(),
                source: e,
            }),
            Err(_) => Err(DeliveryError::SendTimeout {
                endpoint: endpoint.clone(),
                timeout_ms,
            }),
        }
    }
}

/// Delivers messages for one source.
///
/// Exactly one primary attempt and, if configured, one fallback attempt per
/// message. Failures are logged and reported in the outcome, never returned.
pub struct DeliveryClient {
    source_id: String,
    primary: Endpoint,
    fallback: Option<Endpoint>,
    transport: Arc<dyn Transport>,
    send_delay: Duration,
    fallback_delay: Duration,
    cancel: CancellationToken,
}

impl DeliveryClient {
    pub fn with_transport(
        source_id: impl Into<String>,
        primary: Endpoint,
        fallback: Option<Endpoint>,
        config: &DeliveryConfig,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            primary,
            fallback,
            transport,
            send_delay: config.send_delay(),
            fallback_delay: config.fallback_delay(),
            cancel,
        }
    }

    pub fn primary(&self) -> &Endpoint {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Endpoint> {
        self.fallback.as_ref()
    }

    /// Send `message`, falling back once if the primary attempt fails.
    ///
    /// Every attempt that completes is followed by the pacing delay, so the
    /// peer never sees back-to-back messages from one source.
    pub async fn deliver(&self, message: &str) -> DeliveryOutcome {
        let payload = message.as_bytes();
        let id = self.source_id.as_str();

        let outcome = match self.transport.send(&self.primary, payload).await {
            Ok(()) => {
                crate::log_event!(id, "sent", "{}", self.primary);
                DeliveryOutcome::Primary
            }
            Err(primary_err) => {
                crate::debug_event!(id, "primary failed", "{primary_err}");
                self.try_fallback(payload, &primary_err).await
            }
        };

        sleep_or_cancel(self.send_delay, &self.cancel).await;
        outcome
    }

    async fn try_fallback(&self, payload: &[u8], primary_err: &DeliveryError) -> DeliveryOutcome {
        let id = self.source_id.as_str();

        let Some(fallback) = &self.fallback else {
            tracing::warn!(
                "[{id}] delivery failed, no fallback configured ({}): {primary_err}",
                self.primary
            );
            return DeliveryOutcome::Undelivered {
                fallback_attempted: false,
            };
        };

        if !sleep_or_cancel(self.fallback_delay, &self.cancel).await {
            tracing::warn!("[{id}] shutdown before fallback attempt to {fallback}");
            return DeliveryOutcome::Undelivered {
                fallback_attempted: false,
            };
        }

        match self.transport.send(fallback, payload).await {
            Ok(()) => {
                crate::log_event!(id, "sent via fallback", "{fallback}");
                DeliveryOutcome::Fallback
            }
            Err(fallback_err) => {
                tracing::warn!(
                    "[{id}] delivery failed ({} / {fallback}): {primary_err}; {fallback_err}",
                    self.primary
                );
                DeliveryOutcome::Undelivered {
                    fallback_attempted: true,
                }
            }
        }
    }
}
