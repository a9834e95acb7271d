//! Drain loop: the single consumer of the sample sink.
//!
//! Each cycle moves every queued sample into the [`SeriesStore`] and then
//! calls the render hook once. The loop owns the store, which keeps it the
//! store's only writer.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::render::RenderHook;
use crate::series::SeriesStore;
use crate::sink::SampleReceiver;

/// Default time between drain cycles (1 second).
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Drains samples into the series store and triggers rendering.
pub struct DrainLoop<R> {
    receiver: SampleReceiver,
    store: SeriesStore,
    render: R,
    cycles: u64,
}

impl<R: RenderHook> DrainLoop<R> {
    pub fn new(receiver: SampleReceiver, render: R) -> Self {
        Self {
            receiver,
            store: SeriesStore::new(),
            render,
            cycles: 0,
        }
    }

    /// Run one drain cycle. Returns the number of samples moved.
    ///
    /// Never blocks. The render hook runs even when the sink was empty.
    pub fn drain_once(&mut self) -> usize {
        let samples = self.receiver.drain();
        let count = samples.len();
        for sample in samples {
            self.store.append(sample);
        }

        self.cycles += 1;
        if count > 0 {
            tracing::trace!(count, cycle = self.cycles, "Drained samples");
        }
        self.render.render(&self.store);
        count
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    /// Number of completed drain cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Drain every `interval` until `shutdown` fires, then drain once more.
    ///
    /// Returns the loop so the caller can read the final store.
    pub async fn run(mut self, interval: Duration, shutdown: CancellationToken) -> Self {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(interval = ?interval, "Drain loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.drain_once();
                }
            }
        }

        self.drain_once();
        tracing::debug!(
            cycles = self.cycles,
            series = self.store.len(),
            points = self.store.total_points(),
            "Drain loop stopped"
        );
        self
    }
}

impl<R> std::fmt::Debug for DrainLoop<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainLoop")
            .field("cycles", &self.cycles)
            .field("series", &self.store.len())
            .field("queued", &self.receiver.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeFailure;
    use crate::sink::{Sample, sample_channel};
    use crate::target::Target;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook() -> (Arc<AtomicUsize>, impl FnMut(&SeriesStore) + Send) {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        (calls, move |_: &SeriesStore| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn sample(target: &str, outcome: Result<u64, ProbeFailure>) -> Sample {
        Sample::new(
            Target::parse(target).unwrap(),
            outcome.map(Duration::from_millis),
        )
    }

    #[test]
    fn test_empty_drain_renders_once() {
        let (_sink, receiver) = sample_channel();
        let (calls, hook) = counting_hook();
        let mut drain = DrainLoop::new(receiver, hook);

        assert_eq!(drain.drain_once(), 0);
        assert!(drain.store().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(drain.cycles(), 1);
    }

    #[test]
    fn test_drain_moves_all_queued_and_renders_once() {
        let (sink, receiver) = sample_channel();
        let (calls, hook) = counting_hook();
        let mut drain = DrainLoop::new(receiver, hook);

        sink.push(sample("a", Ok(1))).unwrap();
        sink.push(sample("b", Ok(2))).unwrap();
        sink.push(sample("a", Err(ProbeFailure::Timeout))).unwrap();
        sink.push(sample("a", Ok(3))).unwrap();

        assert_eq!(drain.drain_once(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let a = drain.store().get("a").unwrap();
        let outcomes: Vec<_> = a.points().iter().map(|p| p.outcome).collect();
        assert_eq!(
            outcomes,
            [
                Ok(Duration::from_millis(1)),
                Err(ProbeFailure::Timeout),
                Ok(Duration::from_millis(3)),
            ]
        );
        assert_eq!(drain.store().get("b").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_drain_leaves_series_unchanged() {
        let (sink, receiver) = sample_channel();
        let mut drain = DrainLoop::new(receiver, |_: &SeriesStore| {});
        sink.push(sample("a", Ok(1))).unwrap();
        drain.drain_once();

        let before = drain.store().snapshot();
        assert_eq!(drain.drain_once(), 0);
        assert_eq!(drain.store(), &before);
    }

    #[test]
    fn test_new_series_appear_between_cycles() {
        let (sink, receiver) = sample_channel();
        let mut drain = DrainLoop::new(receiver, |_: &SeriesStore| {});

        sink.push(sample("a", Ok(1))).unwrap();
        drain.drain_once();
        assert_eq!(drain.store().len(), 1);

        sink.push(sample("c", Ok(1))).unwrap();
        drain.drain_once();
        assert_eq!(drain.store().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drains_on_cadence_and_on_shutdown() {
        let (sink, receiver) = sample_channel();
        let (calls, hook) = counting_hook();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(
            DrainLoop::new(receiver, hook).run(Duration::from_secs(1), shutdown.clone()),
        );

        sink.push(sample("a", Ok(1))).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        sink.push(sample("a", Ok(2))).unwrap();
        shutdown.cancel();

        let drain = handle.await.unwrap();
        assert_eq!(drain.store().get("a").unwrap().len(), 2);
        // Ticks at 0s, 1s, 2s plus the final drain.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
