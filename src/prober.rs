//! Prober Layer
//!
//! One Tokio task per monitored target probes it at a fixed cadence and
//! pushes every result into the shared [`SampleSink`](crate::SampleSink).
//!
//! # Architecture
//!
//! - [`ProberRegistry`]: Starts and stops probers, at most one per target
//! - [`ProberSettings`]: Tick interval, probe timeout, restart wait
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pingwatch::{ProberRegistry, ProberSettings, TcpProbe, Target, sample_channel};
//!
//! # async fn run() {
//! let (sink, _receiver) = sample_channel();
//! let registry = ProberRegistry::new(Arc::new(TcpProbe::new(443)), sink, ProberSettings::default());
//! registry.start(Target::parse("example.com").unwrap()).await;
//! registry.stop_all().await;
//! # }
//! ```

mod registry;
mod task;

use std::time::Duration;

pub use registry::{DEFAULT_SHUTDOWN_TIMEOUT, ProberInfo, ProberRegistry, StartOutcome};

/// Default time between probes of one target.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default wait for a stopped prober before the same target is restarted.
pub const DEFAULT_RETIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum allowed interval (100 milliseconds).
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Timing parameters shared by every prober of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProberSettings {
    /// Time between probe starts.
    pub interval: Duration,
    /// Upper bound for one probe.
    pub timeout: Duration,
    /// How long `start` waits for a stopped prober of the same target to exit.
    pub retire_timeout: Duration,
}

impl ProberSettings {
    /// Set the probe interval.
    ///
    /// Interval is clamped to a minimum of 100 milliseconds.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            self.interval = MIN_INTERVAL;
        } else {
            self.interval = interval;
        }
        self
    }

    /// Set the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the restart wait.
    pub fn with_retire_timeout(mut self, retire_timeout: Duration) -> Self {
        self.retire_timeout = retire_timeout;
        self
    }
}

impl Default for ProberSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            retire_timeout: DEFAULT_RETIRE_TIMEOUT,
        }
    }
}
