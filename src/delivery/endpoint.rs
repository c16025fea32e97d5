//! Network addresses of NVR monitoring endpoints.

use std::fmt;
use std::str::FromStr;

use super::DeliveryError;

/// Which of a source's endpoints an attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Primary,
    Fallback,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Primary => f.write_str("primary"),
            EndpointRole::Fallback => f.write_str("fallback"),
        }
    }
}

/// A `host:port` pair. IPv6 literals are written in brackets (`[::1]:9000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DeliveryError::InvalidEndpoint {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?,
            None if host.contains(':') => return Err(invalid("IPv6 hosts must be bracketed")),
            None => host,
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let port: u16 = port.parse().map_err(|_| invalid("port must be 0-65535"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Endpoint::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
