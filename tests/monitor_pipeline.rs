//! End-to-end tests for the probe → sink → drain → series pipeline.
//!
//! All tests run on a paused Tokio clock, so tick timing is deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pingwatch::{
    DrainLoop, FAILURE_LATENCY_MS, Probe, ProbeError, ProbeFailure, ProberRegistry,
    ProberSettings, SeriesStore, StartOutcome, Target, parse_targets, sample_channel,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Scripted probe: `10.0.0.1` alternates 20ms / failure, everything else
/// answers in 5ms.
#[derive(Default)]
struct ScriptedProbe {
    calls: Mutex<HashMap<String, usize>>,
}

#[async_trait::async_trait]
impl Probe for ScriptedProbe {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    async fn probe(&self, target: &Target, _timeout: Duration) -> Result<Duration, ProbeError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(target.to_string()).or_default();
            *count += 1;
            *count
        };

        match target.as_str() {
            "10.0.0.1" if call % 2 == 1 => Ok(Duration::from_millis(20)),
            "10.0.0.1" => Err(ProbeError::Transport("host unreachable".into())),
            _ => Ok(Duration::from_millis(5)),
        }
    }
}

struct Pipeline {
    registry: ProberRegistry,
    drain: DrainLoop<Box<dyn FnMut(&SeriesStore) + Send>>,
    renders: Arc<AtomicUsize>,
}

fn pipeline() -> Pipeline {
    let (sink, receiver) = sample_channel();
    let registry = ProberRegistry::new(
        Arc::new(ScriptedProbe::default()),
        sink,
        ProberSettings::default(),
    );

    let renders = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&renders);
    let hook: Box<dyn FnMut(&SeriesStore) + Send> = Box::new(move |_: &SeriesStore| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    Pipeline {
        registry,
        drain: DrainLoop::new(receiver, hook),
        renders,
    }
}

fn series_len(drain: &DrainLoop<Box<dyn FnMut(&SeriesStore) + Send>>, target: &str) -> usize {
    drain.store().get(target).map_or(0, |s| s.len())
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_targets_end_to_end() {
    const CYCLES: usize = 6;
    let Pipeline {
        registry,
        mut drain,
        renders,
    } = pipeline();

    let started = registry
        .start_all(parse_targets("10.0.0.1, 10.0.0.2"))
        .await;
    assert_eq!(started, 2);

    // Drain half-way between probe ticks: 0.5s, 1.5s, 2.5s, ...
    tokio::time::sleep(Duration::from_millis(500)).await;
    for cycle in 0..CYCLES {
        if cycle > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        drain.drain_once();
    }
    assert_eq!(renders.load(Ordering::SeqCst), CYCLES);

    let first = drain.store().get("10.0.0.1").unwrap();
    assert_eq!(first.len(), CYCLES);
    let expected: Vec<f64> = (0..CYCLES)
        .map(|i| if i % 2 == 0 { 20.0 } else { FAILURE_LATENCY_MS })
        .collect();
    assert_eq!(first.plot_values(), expected);
    assert!(
        first
            .points()
            .iter()
            .skip(1)
            .step_by(2)
            .all(|p| p.outcome == Err(ProbeFailure::Transport))
    );

    let second = drain.store().get("10.0.0.2").unwrap();
    assert_eq!(second.len(), CYCLES);
    assert!(second.plot_values().iter().all(|v| *v == 5.0));

    // After stopping, further cycles leave both series unchanged.
    assert_eq!(registry.stop_all().await, 2);
    drain.drain_once();
    let frozen = (series_len(&drain, "10.0.0.1"), series_len(&drain, "10.0.0.2"));
    assert_eq!(frozen, (CYCLES, CYCLES));

    for _ in 0..2 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        drain.drain_once();
        assert_eq!(
            (series_len(&drain, "10.0.0.1"), series_len(&drain, "10.0.0.2")),
            frozen
        );
    }
    assert_eq!(renders.load(Ordering::SeqCst), CYCLES + 3);

    assert!(registry.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_empty_drain_cycles_still_render() {
    let Pipeline {
        registry,
        mut drain,
        renders,
    } = pipeline();

    for _ in 0..3 {
        assert_eq!(drain.drain_once(), 0);
    }
    assert!(drain.store().is_empty());
    assert_eq!(renders.load(Ordering::SeqCst), 3);
    assert_eq!(registry.stop_all().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_restarted_target_keeps_its_series() {
    let Pipeline {
        registry,
        mut drain,
        ..
    } = pipeline();
    let target = Target::parse("10.0.0.2").unwrap();

    registry.start(target.clone()).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    registry.stop("10.0.0.2").await;
    drain.drain_once();
    assert_eq!(series_len(&drain, "10.0.0.2"), 2);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(registry.start(target).await, StartOutcome::Started);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    drain.drain_once();
    assert_eq!(series_len(&drain, "10.0.0.2"), 4);

    assert!(registry.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_new_target_appears_while_running() {
    let Pipeline {
        registry,
        mut drain,
        ..
    } = pipeline();

    registry.start_all(parse_targets("a")).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    drain.drain_once();
    assert_eq!(drain.store().len(), 1);

    registry.start_all(parse_targets("a\nb")).await;
    assert_eq!(registry.len().await, 2);
    tokio::time::sleep(Duration::from_millis(800)).await;
    drain.drain_once();

    assert_eq!(series_len(&drain, "a"), 3);
    assert_eq!(series_len(&drain, "b"), 1);
    assert!(registry.shutdown().await);
}
