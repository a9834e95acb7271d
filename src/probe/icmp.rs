//! ICMP echo probe.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};

use crate::probe::{Probe, ProbeError, resolve_host};
use crate::target::Target;

/// Echo payload size, same as the classic `ping` default.
const PAYLOAD_LEN: usize = 56;

/// ICMP echo probe.
///
/// Opens one raw socket client per address family up front. The IPv6 client
/// is optional: hosts without IPv6 support still probe IPv4 targets, and
/// IPv6 targets then fail with a transport error.
pub struct IcmpProbe {
    v4: Client,
    v6: Option<Client>,
    sequence: AtomicU16,
}

impl IcmpProbe {
    /// Open the ICMP sockets. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Returns `ProbeError::Transport` if the IPv4 socket cannot be opened,
    /// usually for lack of `CAP_NET_RAW`.
    pub fn new() -> Result<Self, ProbeError> {
        let v4 = Client::new(&Config::default())
            .map_err(|e| ProbeError::Transport(format!("failed to open ICMPv4 socket: {e}")))?;

        let v6 = match Client::new(&Config::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "ICMPv6 socket unavailable, IPv6 targets will fail");
                None
            }
        };

        Ok(Self {
            v4,
            v6,
            sequence: AtomicU16::new(0),
        })
    }

    fn client_for(&self, ip: IpAddr) -> Result<&Client, ProbeError> {
        match ip {
            IpAddr::V4(_) => Ok(&self.v4),
            IpAddr::V6(_) => self
                .v6
                .as_ref()
                .ok_or_else(|| ProbeError::Transport("ICMPv6 socket unavailable".to_string())),
        }
    }
}

impl std::fmt::Debug for IcmpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpProbe")
            .field("ipv6", &self.v6.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Probe for IcmpProbe {
    fn kind(&self) -> &'static str {
        "icmp"
    }

    async fn probe(&self, target: &Target, timeout: Duration) -> Result<Duration, ProbeError> {
        let ip = resolve_host(target.as_str()).await?;
        let client = self.client_for(ip)?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        match pinger.ping(PingSequence(seq), &[0; PAYLOAD_LEN]).await {
            Ok((_, rtt)) => Ok(rtt),
            Err(SurgeError::Timeout { .. }) => Err(ProbeError::Timeout),
            Err(e) => Err(ProbeError::Transport(e.to_string())),
        }
    }
}
