//! Series store: per-target, append-only sample history.
//!
//! The store has no internal locking. It is meant to be owned by the drain
//! loop, which is its only writer; other readers get a [`SeriesStore::snapshot`].

use std::collections::BTreeMap;
use std::collections::btree_map;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::{FAILURE_LATENCY_MS, ProbeOutcome, latency_ms};
use crate::sink::Sample;
use crate::target::Target;

/// One point in a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub observed_at: DateTime<Utc>,
    pub outcome: ProbeOutcome,
}

impl SeriesPoint {
    pub fn latency_ms(&self) -> Option<f64> {
        latency_ms(&self.outcome)
    }
}

/// Summary statistics over a series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub failures: usize,
    /// Fraction of failed probes, `0.0` for an empty series.
    pub loss: f64,
    pub min_ms: Option<f64>,
    pub mean_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub last_ms: Option<f64>,
}

/// Ordered history of one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    pub fn push(&mut self, point: SeriesPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values for a numeric plot, failures drawn at [`FAILURE_LATENCY_MS`].
    pub fn plot_values(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| p.latency_ms().unwrap_or(FAILURE_LATENCY_MS))
            .collect()
    }

    pub fn stats(&self) -> SeriesStats {
        let count = self.points.len();
        let latencies: Vec<f64> = self
            .points
            .iter()
            .filter_map(SeriesPoint::latency_ms)
            .collect();
        let failures = count - latencies.len();

        let min_ms = latencies.iter().copied().reduce(f64::min);
        let max_ms = latencies.iter().copied().reduce(f64::max);
        let mean_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        SeriesStats {
            count,
            failures,
            loss: if count == 0 {
                0.0
            } else {
                failures as f64 / count as f64
            },
            min_ms,
            mean_ms,
            max_ms,
            last_ms: self.points.last().and_then(SeriesPoint::latency_ms),
        }
    }
}

/// Keyed accumulator of series, iterated in target order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesStore {
    series: BTreeMap<Target, Series>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to its target's series, creating the series on first write.
    pub fn append(&mut self, sample: Sample) {
        self.series.entry(sample.target).or_default().push(SeriesPoint {
            observed_at: sample.observed_at,
            outcome: sample.outcome,
        });
    }

    pub fn get(&self, target: &str) -> Option<&Series> {
        self.series.get(target)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Target, Series> {
        self.series.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.series.keys()
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of points across all series.
    pub fn total_points(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }

    /// Owned copy for readers that live outside the drain loop.
    pub fn snapshot(&self) -> SeriesStore {
        self.clone()
    }
}

impl<'a> IntoIterator for &'a SeriesStore {
    type Item = (&'a Target, &'a Series);
    type IntoIter = btree_map::Iter<'a, Target, Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}
