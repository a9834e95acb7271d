//! Render hooks invoked once per drain cycle.

use crate::series::SeriesStore;

/// Receives the series store after every drain cycle.
///
/// Called exactly once per cycle, also when nothing new arrived.
pub trait RenderHook: Send {
    fn render(&mut self, store: &SeriesStore);
}

impl<F> RenderHook for F
where
    F: FnMut(&SeriesStore) + Send,
{
    fn render(&mut self, store: &SeriesStore) {
        self(store)
    }
}

/// Headless renderer that logs one summary line per target.
///
/// Only logs when points were added since the previous render.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_total: usize,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderHook for LogRenderer {
    fn render(&mut self, store: &SeriesStore) {
        let total = store.total_points();
        if total == self.last_total {
            return;
        }
        self.last_total = total;

        for (target, series) in store {
            let stats = series.stats();
            tracing::info!(
                host = %target,
                samples = stats.count,
                loss_pct = format_args!("{:.1}", stats.loss * 100.0),
                last_ms = ?stats.last_ms,
                min_ms = ?stats.min_ms,
                mean_ms = ?stats.mean_ms,
                max_ms = ?stats.max_ms,
                "Latency"
            );
        }
    }
}
