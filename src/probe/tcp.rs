//! TCP connect probe.
//!
//! Measures the time to complete a TCP handshake with `host:port`. Works
//! without raw-socket privileges, at the cost of needing an open port.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use crate::probe::{Probe, ProbeError};
use crate::target::Target;

/// Default port for TCP probes (HTTPS).
pub const DEFAULT_TCP_PORT: u16 = 443;

/// TCP connect latency probe.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    /// Create a probe connecting to `port` on every target.
    ///
    /// Targets written as a full socket address (`10.0.0.1:22`) use their
    /// own port instead.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn resolve(&self, target: &Target) -> Result<SocketAddr, ProbeError> {
        if let Ok(addr) = target.as_str().parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host((target.as_str(), self.port))
            .await
            .map_err(ProbeError::Resolve)?;
        addrs.next().ok_or_else(|| {
            ProbeError::Resolve(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses found",
            ))
        })
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TCP_PORT)
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    fn kind(&self) -> &'static str {
        "tcp"
    }

    async fn probe(&self, target: &Target, timeout: Duration) -> Result<Duration, ProbeError> {
        let addr = self.resolve(target).await?;

        let start = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.port());
        let target = Target::parse("127.0.0.1").unwrap();
        let rtt = probe.probe(&target, Duration::from_secs(1)).await;
        assert!(rtt.is_ok(), "expected success, got {rtt:?}");
    }

    #[tokio::test]
    async fn test_tcp_probe_socket_addr_target_overrides_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(1);
        let target = Target::parse(&addr.to_string()).unwrap();
        assert!(probe.probe(&target, Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_probe_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpProbe::new(port);
        let target = Target::parse("127.0.0.1").unwrap();
        let err = probe
            .probe(&target, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)), "got {err:?}");
    }

    #[test]
    fn test_tcp_probe_default_port() {
        assert_eq!(TcpProbe::default().port(), DEFAULT_TCP_PORT);
    }
}
