//! ScheduledProbeRunner - periodic background runs with a cached snapshot
//!
//! The background cycle runs the probes immediately on `start` and then once
//! per `frequency`. Ticks that fire while a run is still in flight are
//! skipped. Each finished result set is built off-lock and swapped into the
//! cache under a short write lock, so readers only ever see whole sets.
//!
//! `stop` abandons an in-flight run: its result is never written.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::outcome::ResultSet;
use super::runner::ProbeRunner;

/// Interval used when none (or zero) is configured
pub const DEFAULT_FREQUENCY: Duration = Duration::from_secs(60);

/// Handle to the active background cycle
struct Cycle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Cycle {
    fn cancel(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Background health checker exposing the latest result set.
pub struct ScheduledProbeRunner {
    runner: ProbeRunner,
    frequency: Duration,
    latest: Arc<RwLock<Arc<ResultSet>>>,
    cycle: Mutex<Option<Cycle>>,
}

impl ScheduledProbeRunner {
    /// Wrap `runner`; a zero `frequency` means [`DEFAULT_FREQUENCY`]
    pub fn new(runner: ProbeRunner, frequency: Duration) -> Self {
        let frequency = if frequency.is_zero() {
            DEFAULT_FREQUENCY
        } else {
            frequency
        };
        Self {
            runner,
            frequency,
            latest: Arc::new(RwLock::new(Arc::new(ResultSet::new()))),
            cycle: Mutex::new(None),
        }
    }

    /// Interval between automatic runs
    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// The wrapped on-demand runner
    pub fn runner(&self) -> &ProbeRunner {
        &self.runner
    }

    /// Whether a background cycle is active
    pub fn is_running(&self) -> bool {
        self.cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the background cycle, replacing any cycle already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = cycle.take() {
            old.cancel();
            tracing::debug!("Restarting scheduled probe cycle");
        }

        let token = match &self.runner.config().parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let handle = tokio::spawn(run_cycle(
            self.runner.clone(),
            self.frequency,
            Arc::clone(&self.latest),
            token.clone(),
        ));
        tracing::info!(
            frequency_ms = self.frequency.as_millis() as u64,
            probes = self.runner.config().probes.len(),
            "Scheduled probe cycle started"
        );
        *cycle = Some(Cycle { token, handle });
    }

    /// Stop the background cycle. No-op when already stopped.
    ///
    /// Returns as soon as the cycle is signalled; an in-flight run is
    /// abandoned and the cached snapshot is left as it was.
    pub fn stop(&self) {
        let mut cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = cycle.take() {
            old.cancel();
            tracing::info!("Scheduled probe cycle stopped");
        }
    }

    /// Copy of the most recently completed result set.
    ///
    /// Empty until the first background run finishes.
    pub fn snapshot(&self) -> ResultSet {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        ResultSet::clone(&latest)
    }
}

impl Drop for ScheduledProbeRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ScheduledProbeRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledProbeRunner")
            .field("frequency", &self.frequency)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_cycle(
    runner: ProbeRunner,
    frequency: Duration,
    latest: Arc<RwLock<Arc<ResultSet>>>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(frequency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let results = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            results = runner.run() => results,
        };

        if results.failed() {
            tracing::warn!(
                failures = results.failures().count(),
                "Scheduled probe run reported failures"
            );
        }

        let fresh = Arc::new(results);
        *latest.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }
}
