//! Pingwatch - Continuous Multi-Target Latency Monitor
//!
//! This crate keeps one probing task per monitored host and funnels every
//! measurement through a single ordered channel into an in-memory series
//! store that a render hook can draw. It can be used as a library, or run
//! as the headless `pingwatch` binary.
//!
//! # Architecture
//!
//! - **Probe**: One latency measurement per call (ICMP echo or TCP connect)
//! - **Prober Registry**: Starts/stops per-target prober tasks, one per target
//! - **Sample Sink**: Unbounded multi-producer channel of samples
//! - **Drain Loop**: Single consumer, moves samples into the series store
//!   and calls the render hook once per cycle
//! - **Series Store**: Append-only per-target history
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pingwatch::{DrainLoop, LogRenderer, ProberRegistry, ProberSettings, TcpProbe, parse_targets, sample_channel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sink, receiver) = sample_channel();
//!     let registry = ProberRegistry::new(Arc::new(TcpProbe::new(443)), sink, ProberSettings::default());
//!     let mut drain = DrainLoop::new(receiver, LogRenderer::new());
//!
//!     registry.start_all(parse_targets("example.com, example.org")).await;
//!     for _ in 0..10 {
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!         drain.drain_once();
//!     }
//!     registry.shutdown().await;
//! }
//! ```

pub mod config;
pub mod console;
pub mod drain;
pub mod export;
pub mod probe;
pub mod prober;
pub mod render;
pub mod series;
pub mod sink;
pub mod target;

pub use console::ConsoleCommand;
pub use drain::DrainLoop;
pub use export::{ExportError, ExportHook, JsonExporter, default_export_filename};
pub use probe::{
    FAILURE_LATENCY_MS, IcmpProbe, Probe, ProbeError, ProbeFailure, ProbeOutcome, TcpProbe,
};
pub use prober::{ProberInfo, ProberRegistry, ProberSettings, StartOutcome};
pub use render::{LogRenderer, RenderHook};
pub use series::{Series, SeriesPoint, SeriesStats, SeriesStore};
pub use sink::{Sample, SampleReceiver, SampleSink, SinkError, sample_channel};
pub use target::{Target, parse_targets};
