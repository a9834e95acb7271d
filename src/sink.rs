//! Sample sink: the ordered conduit between probers and the drain loop.
//!
//! Any number of [`SampleSink`] clones push into one unbounded channel; a
//! single [`SampleReceiver`] drains it. Samples from one producer keep their
//! order. The channel is unbounded, so a starved consumer lets it grow
//! without limit.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::probe::ProbeOutcome;
use crate::target::Target;

/// Errors returned when pushing into the sink.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side has been dropped.
    #[error("sample sink closed")]
    Closed,
}

/// One recorded probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub target: Target,
    pub outcome: ProbeOutcome,
    pub observed_at: DateTime<Utc>,
}

impl Sample {
    /// Create a sample stamped with the current time.
    pub fn new(target: Target, outcome: ProbeOutcome) -> Self {
        Self {
            target,
            outcome,
            observed_at: Utc::now(),
        }
    }
}

/// Create a connected sink/receiver pair.
pub fn sample_channel() -> (SampleSink, SampleReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SampleSink { tx }, SampleReceiver { rx })
}

/// Producer handle. Cheap to clone, one per prober.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: UnboundedSender<Sample>,
}

impl SampleSink {
    /// Enqueue a sample. Never blocks.
    pub fn push(&self, sample: Sample) -> Result<(), SinkError> {
        self.tx.send(sample).map_err(|_| SinkError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The single consumer of the sink.
#[derive(Debug)]
pub struct SampleReceiver {
    rx: UnboundedReceiver<Sample>,
}

impl SampleReceiver {
    /// Take every sample queued right now, in arrival order.
    ///
    /// Returns immediately with an empty vector when nothing is queued.
    pub fn drain(&mut self) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(self.rx.len());
        while let Ok(sample) = self.rx.try_recv() {
            samples.push(sample);
        }
        samples
    }

    /// Number of samples currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeFailure;
    use std::time::Duration;

    fn sample(target: &str, ms: u64) -> Sample {
        Sample::new(Target::parse(target).unwrap(), Ok(Duration::from_millis(ms)))
    }

    #[test]
    fn test_drain_empty_returns_nothing() {
        let (_sink, mut receiver) = sample_channel();
        assert!(receiver.drain().is_empty());
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_drain_takes_everything_in_order() {
        let (sink, mut receiver) = sample_channel();
        for ms in 1..=5 {
            sink.push(sample("a", ms)).unwrap();
        }
        sink.push(Sample::new(
            Target::parse("b").unwrap(),
            Err(ProbeFailure::Timeout),
        ))
        .unwrap();
        assert_eq!(receiver.len(), 6);

        let drained = receiver.drain();
        assert_eq!(drained.len(), 6);
        let a: Vec<_> = drained
            .iter()
            .filter(|s| s.target.as_str() == "a")
            .map(|s| s.outcome.unwrap().as_millis())
            .collect();
        assert_eq!(a, [1, 2, 3, 4, 5]);
        assert_eq!(drained[5].outcome, Err(ProbeFailure::Timeout));
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_push_after_receiver_dropped() {
        let (sink, receiver) = sample_channel();
        drop(receiver);
        assert!(sink.is_closed());
        assert_eq!(sink.push(sample("a", 1)), Err(SinkError::Closed));
    }

    #[test]
    fn test_concurrent_producers_keep_per_target_order() {
        let (sink, mut receiver) = sample_channel();
        let handles: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for ms in 0..200 {
                        sink.push(sample(name, ms)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = receiver.drain();
        assert_eq!(drained.len(), 800);
        for name in ["a", "b", "c", "d"] {
            let values: Vec<u128> = drained
                .iter()
                .filter(|s| s.target.as_str() == name)
                .map(|s| s.outcome.unwrap().as_millis())
                .collect();
            assert_eq!(values, (0..200).collect::<Vec<u128>>());
        }
    }
}
