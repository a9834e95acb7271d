//! Probe Layer
//!
//! A probe performs exactly one latency measurement against a [`Target`]
//! within a bounded timeout. Probers call it once per tick and record the
//! result as data; a failed probe never stops monitoring.
//!
//! - [`Probe`]: Core trait for measurement transports
//! - [`IcmpProbe`]: ICMP echo via raw sockets (needs `CAP_NET_RAW` or root)
//! - [`TcpProbe`]: TCP connect latency, usable without privileges

mod icmp;
mod tcp;

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::target::Target;

pub use icmp::IcmpProbe;
pub use tcp::{DEFAULT_TCP_PORT, TcpProbe};

/// Latency used when a failed probe has to be drawn on a numeric axis.
pub const FAILURE_LATENCY_MS: f64 = 1000.0;

/// Errors a single probe attempt can end with.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No reply within the timeout.
    #[error("probe timed out")]
    Timeout,

    /// Host name could not be resolved.
    #[error("failed to resolve host: {0}")]
    Resolve(#[source] std::io::Error),

    /// Socket-level failure (refused, unreachable, no permission, ...).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProbeError {
    /// Collapse the error into the data-level failure kind stored in series.
    pub fn failure(&self) -> ProbeFailure {
        match self {
            Self::Timeout => ProbeFailure::Timeout,
            Self::Resolve(_) => ProbeFailure::Unresolved,
            Self::Transport(_) => ProbeFailure::Transport,
        }
    }
}

/// Why a sample carries no latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    Timeout,
    Unresolved,
    Transport,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Unresolved => "unresolved",
            Self::Transport => "transport",
        };
        f.write_str(s)
    }
}

/// Result of one probe as recorded in a sample.
pub type ProbeOutcome = Result<Duration, ProbeFailure>;

/// Latency in milliseconds, or `None` for a failed probe.
pub fn latency_ms(outcome: &ProbeOutcome) -> Option<f64> {
    outcome.as_ref().ok().map(|d| d.as_secs_f64() * 1000.0)
}

/// Latency measurement transport.
///
/// Implementations must return within roughly `timeout`; probers enforce the
/// bound anyway and record an overrun as [`ProbeError::Timeout`].
#[async_trait::async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Short transport name for logs (e.g. `"icmp"`).
    fn kind(&self) -> &'static str;

    /// Measure the round-trip time to `target` once.
    async fn probe(&self, target: &Target, timeout: Duration) -> Result<Duration, ProbeError>;
}

/// Resolve a host name to an IP address.
///
/// IP literals are returned without a DNS lookup.
pub async fn resolve_host(host: &str) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(ProbeError::Resolve)?;
    addrs.next().map(|addr| addr.ip()).ok_or_else(|| {
        ProbeError::Resolve(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no addresses found",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_failure() {
        assert_eq!(ProbeError::Timeout.failure(), ProbeFailure::Timeout);
        assert_eq!(
            ProbeError::Transport("refused".into()).failure(),
            ProbeFailure::Transport
        );
        let resolve = ProbeError::Resolve(std::io::Error::other("nx"));
        assert_eq!(resolve.failure(), ProbeFailure::Unresolved);
    }

    #[test]
    fn test_latency_ms() {
        assert_eq!(latency_ms(&Ok(Duration::from_millis(20))), Some(20.0));
        assert_eq!(latency_ms(&Err(ProbeFailure::Timeout)), None);
    }

    #[test]
    fn test_failure_serde_names() {
        let json = serde_json::to_string(&ProbeFailure::Unresolved).unwrap();
        assert_eq!(json, "\"unresolved\"");
    }

    #[tokio::test]
    async fn test_resolve_host_ipv4() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_resolve_host_ipv6() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }
}
