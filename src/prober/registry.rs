//! Prober registry for managing per-target prober lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::probe::Probe;
use crate::prober::ProberSettings;
use crate::prober::task::ProberTask;
use crate::sink::SampleSink;
use crate::target::Target;

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of [`ProberRegistry::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new prober was spawned.
    Started,
    /// A live prober for the target already exists, or a restart of it is
    /// already waiting; nothing changed.
    AlreadyRunning,
    /// The target was stopped while this call waited for its previous
    /// prober to exit; nothing was spawned.
    Cancelled,
}

/// Metadata about a running prober.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProberInfo {
    pub target: Target,
    /// Increases with every spawn across the registry.
    pub generation: u64,
    pub started_at: DateTime<Utc>,
}

struct ProberHandle {
    info: ProberInfo,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ProberHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

#[derive(Default)]
struct RegistryState {
    active: HashMap<Target, ProberHandle>,
    /// Stopped probers that may not have exited yet, awaited before a restart.
    retiring: HashMap<Target, JoinHandle<()>>,
    /// Restarts waiting on a retiring prober, `false` once stopped meanwhile.
    pending: HashMap<Target, bool>,
    next_generation: u64,
}

/// Registry of running probers, keyed by target.
///
/// Holds at most one live prober per target. All mutations go through one
/// async mutex, which is never held across a wait on a prober task, so a
/// slow target cannot stall control of the others.
pub struct ProberRegistry {
    probe: Arc<dyn Probe>,
    sink: SampleSink,
    settings: ProberSettings,
    root: CancellationToken,
    state: Mutex<RegistryState>,
}

impl ProberRegistry {
    /// Create an empty registry. Probers push into clones of `sink`.
    pub fn new(probe: Arc<dyn Probe>, sink: SampleSink, settings: ProberSettings) -> Self {
        Self {
            probe,
            sink,
            settings,
            root: CancellationToken::new(),
            state: Mutex::new(RegistryState::default()),
        }
    }
}

impl std::fmt::Debug for ProberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProberRegistry")
            .field("probe", &self.probe.kind())
            .field("settings", &self.settings)
            .field(
                "prober_count",
                &self.state.try_lock().map(|s| s.active.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

impl ProberRegistry {
    /// Start probing `target` unless a live prober for it already exists.
    ///
    /// If the target was stopped recently, waits up to
    /// `settings.retire_timeout` for the old task to exit and aborts it past
    /// that, so two probers of one target never overlap. The registry lock is
    /// released during that wait; a `stop` of the same target issued
    /// meanwhile cancels the restart.
    pub async fn start(&self, target: Target) -> StartOutcome {
        let previous = {
            let mut state = self.state.lock().await;

            if state.active.get(&target).is_some_and(ProberHandle::is_live) {
                tracing::debug!(host = %target, "Prober already running");
                return StartOutcome::AlreadyRunning;
            }
            if let Some(wanted) = state.pending.get_mut(&target) {
                *wanted = true;
                tracing::debug!(host = %target, "Prober restart already pending");
                return StartOutcome::AlreadyRunning;
            }

            // An entry whose task exited on its own is replaced.
            if let Some(stale) = state.active.remove(&target) {
                stale.token.cancel();
            }
            match state.retiring.remove(&target) {
                Some(previous) if !previous.is_finished() => {
                    state.pending.insert(target.clone(), true);
                    previous
                }
                _ => {
                    self.spawn_locked(&mut state, target);
                    return StartOutcome::Started;
                }
            }
        };

        self.await_retired(&target, previous).await;

        let mut state = self.state.lock().await;
        if state.pending.remove(&target) != Some(true) {
            tracing::debug!(host = %target, "Pending prober restart was cancelled");
            return StartOutcome::Cancelled;
        }
        self.spawn_locked(&mut state, target);
        StartOutcome::Started
    }

    /// Start every target in order. Returns how many were newly started.
    pub async fn start_all(&self, targets: impl IntoIterator<Item = Target>) -> usize {
        let mut started = 0;
        for target in targets {
            if self.start(target).await == StartOutcome::Started {
                started += 1;
            }
        }
        started
    }

    /// Signal the prober of `target` to stop and forget it.
    ///
    /// Does not wait for the task to exit. Also cancels a restart of the
    /// target that is still waiting. Returns `false` if the target was
    /// neither registered nor pending.
    pub async fn stop(&self, target: &str) -> bool {
        let mut state = self.state.lock().await;
        stop_locked(&mut state, target)
    }

    /// Stop every registered prober. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let targets: Vec<Target> = state
            .active
            .keys()
            .chain(state.pending.keys())
            .cloned()
            .collect();

        let mut stopped = 0;
        for target in &targets {
            if stop_locked(&mut state, target.as_str()) {
                stopped += 1;
            }
        }

        if stopped > 0 {
            tracing::info!(count = stopped, "All probers stopped");
        }
        stopped
    }

    /// Whether a live prober exists for `target`.
    pub async fn is_running(&self, target: &str) -> bool {
        self.state
            .lock()
            .await
            .active
            .get(target)
            .is_some_and(ProberHandle::is_live)
    }

    /// Number of registered probers.
    pub async fn len(&self) -> usize {
        self.state.lock().await.active.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// List registered probers sorted by target.
    pub async fn list(&self) -> Vec<ProberInfo> {
        let state = self.state.lock().await;
        let mut infos: Vec<ProberInfo> = state.active.values().map(|h| h.info.clone()).collect();
        infos.sort_by(|a, b| a.target.cmp(&b.target));
        infos
    }

    /// Stop everything and wait for all tasks with the default timeout.
    pub async fn shutdown(self) -> bool {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Stop everything and wait up to `timeout` for all tasks to exit.
    ///
    /// Tasks still running at the deadline are aborted. Returns `true` when
    /// every task exited on its own.
    pub async fn shutdown_with_timeout(self, timeout: Duration) -> bool {
        self.root.cancel();

        let mut state = self.state.into_inner();
        let mut tasks: Vec<JoinHandle<()>> = state
            .active
            .drain()
            .map(|(_, handle)| handle.task)
            .chain(state.retiring.drain().map(|(_, task)| task))
            .collect();
        let task_count = tasks.len();

        let joined = tokio::time::timeout(timeout, async {
            for task in tasks.iter_mut() {
                if let Err(e) = task.await
                    && e.is_panic()
                {
                    tracing::error!(error = %e, "Prober task panicked");
                }
            }
        })
        .await;

        if joined.is_err() {
            tracing::warn!(task_count, "Prober registry shutdown timed out, aborting");
            for task in &tasks {
                task.abort();
            }
            return false;
        }

        tracing::info!(task_count, "Prober registry shutdown complete");
        true
    }

    // --- Private helpers ---

    fn spawn_locked(&self, state: &mut RegistryState, target: Target) {
        state.next_generation += 1;
        let generation = state.next_generation;
        let token = self.root.child_token();

        let task = tokio::spawn(
            ProberTask {
                target: target.clone(),
                generation,
                probe: Arc::clone(&self.probe),
                sink: self.sink.clone(),
                settings: self.settings,
                token: token.clone(),
            }
            .run(),
        );

        let info = ProberInfo {
            target: target.clone(),
            generation,
            started_at: Utc::now(),
        };
        state.active.insert(target.clone(), ProberHandle { info, token, task });

        tracing::info!(
            host = %target,
            generation,
            probe = self.probe.kind(),
            interval = ?self.settings.interval,
            "Prober started"
        );
    }

    async fn await_retired(&self, target: &Target, mut previous: JoinHandle<()>) {
        if previous.is_finished() {
            return;
        }
        if tokio::time::timeout(self.settings.retire_timeout, &mut previous)
            .await
            .is_err()
        {
            tracing::warn!(
                host = %target,
                retire_timeout = ?self.settings.retire_timeout,
                "Previous prober did not exit in time, aborting"
            );
            previous.abort();
        }
    }
}

fn stop_locked(state: &mut RegistryState, target: &str) -> bool {
    let Some(handle) = state.active.remove(target) else {
        if let Some(wanted) = state.pending.get_mut(target)
            && *wanted
        {
            *wanted = false;
            tracing::info!(host = %target, "Pending prober restart cancelled");
            return true;
        }
        return false;
    };
    handle.token.cancel();

    state.retiring.retain(|_, task| !task.is_finished());
    tracing::info!(
        host = %handle.info.target,
        generation = handle.info.generation,
        "Prober stopped"
    );
    state.retiring.insert(handle.info.target, handle.task);
    true
}
