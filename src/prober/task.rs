//! The repeating probe loop of a single target.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::probe::{Probe, ProbeError, ProbeOutcome};
use crate::prober::ProberSettings;
use crate::sink::{Sample, SampleSink};
use crate::target::Target;

/// Everything one prober task owns.
pub(super) struct ProberTask {
    pub target: Target,
    pub generation: u64,
    pub probe: Arc<dyn Probe>,
    pub sink: SampleSink,
    pub settings: ProberSettings,
    pub token: CancellationToken,
}

impl ProberTask {
    /// Probe once per tick until cancelled or the sink closes.
    ///
    /// Both the inter-tick wait and an in-flight probe are abandoned as soon
    /// as the token fires, and a result that completes after cancellation is
    /// discarded. A stop racing the final push can still let at most one
    /// in-flight sample through.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reachable: Option<bool> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                outcome = self.probe_once() => outcome,
            };

            if self.token.is_cancelled() {
                break;
            }

            self.log_transition(&mut reachable, &outcome);

            if self
                .sink
                .push(Sample::new(self.target.clone(), outcome))
                .is_err()
            {
                tracing::debug!(host = %self.target, "Sample sink closed, prober exiting");
                break;
            }
        }

        tracing::debug!(host = %self.target, generation = self.generation, "Prober loop exited");
    }

    async fn probe_once(&self) -> ProbeOutcome {
        let timeout = self.settings.timeout;
        let result = tokio::time::timeout(timeout, self.probe.probe(&self.target, timeout))
            .await
            .unwrap_or(Err(ProbeError::Timeout));

        match result {
            Ok(rtt) => {
                tracing::trace!(
                    host = %self.target,
                    latency_ms = rtt.as_secs_f64() * 1000.0,
                    "Probe succeeded"
                );
                Ok(rtt)
            }
            Err(e) => {
                tracing::trace!(host = %self.target, error = %e, "Probe failed");
                Err(e.failure())
            }
        }
    }

    /// Log reachability changes instead of every single probe.
    fn log_transition(&self, reachable: &mut Option<bool>, outcome: &ProbeOutcome) {
        let now = outcome.is_ok();
        if *reachable == Some(now) {
            return;
        }
        match (reachable.is_some(), outcome) {
            (_, Err(failure)) => {
                tracing::warn!(host = %self.target, failure = %failure, "Target unreachable")
            }
            (true, Ok(_)) => tracing::info!(host = %self.target, "Target reachable again"),
            (false, Ok(_)) => tracing::debug!(host = %self.target, "Target reachable"),
        }
        *reachable = Some(now);
    }
}
