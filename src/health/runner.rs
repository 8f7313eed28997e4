//! ProbeRunner - run every probe once, in parallel, under a deadline
//!
//! Each probe is driven on its own blocking-pool thread through the runtime
//! handle, so a probe that blocks its thread cannot starve the coordinator.
//! The coordinator collects completions from a per-run channel until every
//! probe has reported or the deadline fires, then fills in a deadline failure
//! for whatever is still missing. Probes still awaiting at that point are
//! dropped once the run token is cancelled; probes stuck in synchronous code
//! keep their thread until they return, and their late sends hit a closed
//! channel.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::context::ProbeContext;
use super::outcome::{Outcome, ResultSet};
use super::panic::contain;
use super::probe::{Probe, ProbeSet};

/// Run budget used when none (or zero) is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Message recorded for probes still outstanding at the deadline
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Message recorded for probes still outstanding when the parent was cancelled
pub const CONTEXT_CANCELED: &str = "context canceled";

/// Side-channel notified once per failing probe per run: `(name, message, diagnostic)`
pub type FailureLogger = Arc<dyn Fn(&str, &str, &str) + Send + Sync>;

/// Immutable configuration for a [`ProbeRunner`]
#[derive(Clone, Default)]
pub struct RunnerConfig {
    /// Wall-clock budget for one run; zero means [`DEFAULT_TIMEOUT`]
    pub timeout: Duration,
    /// Probes to execute
    pub probes: ProbeSet,
    /// Optional failure side-channel
    pub on_failure: Option<FailureLogger>,
    /// Optional parent token; cancelling it ends in-flight runs early
    pub parent: Option<CancellationToken>,
}

impl RunnerConfig {
    /// Create a config for the given probes with default settings
    pub fn new(probes: ProbeSet) -> Self {
        Self {
            probes,
            ..Self::default()
        }
    }

    /// Set the run timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the failure side-channel
    pub fn with_failure_logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&str, &str, &str) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(logger));
        self
    }

    /// Derive every run's context from `parent`
    pub fn with_parent(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Timeout actually applied, after defaulting
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }
}

impl fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("timeout", &self.timeout)
            .field("probes", &self.probes)
            .field("on_failure", &self.on_failure.is_some())
            .field("parent", &self.parent.is_some())
            .finish()
    }
}

/// Executes a fixed probe set concurrently. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    config: Arc<RunnerConfig>,
}

impl ProbeRunner {
    /// Create a runner from its configuration
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Runner over `probes` with default settings
    pub fn from_probes(probes: ProbeSet) -> Self {
        Self::new(RunnerConfig::new(probes))
    }

    /// The runner's configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every probe once and collect a complete result set.
    ///
    /// Returns within the configured timeout (plus scheduling overhead) no
    /// matter how the probes behave, including probes that block their
    /// thread. Never fails: errors, panics and timeouts all come back as
    /// unhealthy outcomes.
    ///
    /// Must be called from within a tokio runtime. On a `current_thread`
    /// runtime the caller must be inside `Runtime::block_on` so the time and
    /// IO drivers keep running for probes.
    pub async fn run(&self) -> ResultSet {
        let mut results = ResultSet::new();
        let probes = &self.config.probes;
        if probes.is_empty() {
            return results;
        }

        let timeout = self.config.effective_timeout();
        let deadline = Instant::now() + timeout;
        let token = match &self.config.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let _cancel_on_return = token.clone().drop_guard();
        let ctx = ProbeContext::new(token.clone(), deadline);

        let (tx, mut rx) = mpsc::channel::<(String, Outcome)>(probes.len());
        let handle = Handle::current();
        for (name, probe) in probes.iter() {
            let task = execute(name.clone(), Arc::clone(probe), ctx.clone(), tx.clone());
            let handle = handle.clone();
            tokio::task::spawn_blocking(move || handle.block_on(task));
        }
        drop(tx);

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        let reason = loop {
            if results.len() == probes.len() {
                break None;
            }
            tokio::select! {
                biased;
                _ = &mut sleep => break Some(DEADLINE_EXCEEDED),
                _ = token.cancelled() => break Some(CONTEXT_CANCELED),
                received = rx.recv() => match received {
                    // Completions noticed after the deadline are late, however they queued
                    Some(_) if Instant::now() >= deadline => break Some(DEADLINE_EXCEEDED),
                    Some((name, outcome)) => {
                        if !outcome.healthy {
                            self.notify_failure(&name, &outcome);
                        }
                        results.insert(name, outcome);
                    }
                    // Every sender is gone; only possible if a task was torn down
                    None => break Some(DEADLINE_EXCEEDED),
                },
            }
        };

        if let Some(reason) = reason {
            token.cancel();
            tracing::debug!(
                outstanding = probes.len() - results.len(),
                reason,
                timeout_ms = timeout.as_millis() as u64,
                "Probe run ended before all probes reported"
            );
            for name in probes.names() {
                if !results.contains(name) {
                    let outcome = Outcome::unhealthy(reason);
                    self.notify_failure(name, &outcome);
                    results.insert(name, outcome);
                }
            }
        }

        results
    }

    /// Hand a failure to the side-channel without blocking the run
    fn notify_failure(&self, name: &str, outcome: &Outcome) {
        tracing::debug!(probe = %name, message = outcome.message(), "Probe unhealthy");
        let Some(logger) = self.config.on_failure.clone() else {
            return;
        };
        let name = name.to_string();
        let message = outcome.message().to_string();
        let diagnostic = outcome.diagnostic().to_string();
        tokio::task::spawn_blocking(move || logger(&name, &message, &diagnostic));
    }
}

/// Body of one probe task.
///
/// The probe is polled first so a probe reacting to cancellation still gets
/// to finish; otherwise the pending probe is dropped once the run ends.
async fn execute(
    name: String,
    probe: Arc<dyn Probe>,
    ctx: ProbeContext,
    tx: mpsc::Sender<(String, Outcome)>,
) {
    let checked = tokio::select! {
        biased;
        checked = contain(probe.check(ctx.clone())) => checked,
        _ = ctx.cancelled() => {
            tracing::debug!(probe = %name, "Probe abandoned after run ended");
            return;
        }
    };
    let outcome = match checked {
        Ok(Ok(())) => Outcome::healthy(),
        Ok(Err(err)) => Outcome::unhealthy(format!("{:#}", err)),
        Err(crash) => {
            tracing::warn!(probe = %name, message = %crash.message, "Probe panicked");
            Outcome::crashed(crash.message, crash.trace)
        }
    };
    // Receiver is gone once the run has finalized; late results are dropped
    let _ = tx.send((name, outcome)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::probe_fn;
    use std::sync::Mutex;

    fn healthy() -> impl Probe {
        probe_fn(|_| async { Ok(()) })
    }

    fn failing(message: &'static str) -> impl Probe {
        probe_fn(move |_| async move { eyre::bail!(message) })
    }

    fn stalled() -> impl Probe {
        probe_fn(|_| async {
            std::future::pending::<()>().await;
            Ok(())
        })
    }

    #[test]
    fn test_effective_timeout_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);

        let config = RunnerConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.effective_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_empty_probe_set_is_healthy() {
        let runner = ProbeRunner::from_probes(ProbeSet::new());
        let results = runner.run().await;
        assert!(results.is_empty());
        assert!(!results.failed());
    }

    #[tokio::test]
    async fn test_disk_and_net_scenario() {
        let probes = ProbeSet::new()
            .with("disk", healthy())
            .unwrap()
            .with("net", failing("unreachable"))
            .unwrap();
        let runner = ProbeRunner::new(RunnerConfig::new(probes).with_timeout(Duration::from_secs(2)));

        let results = runner.run().await;
        assert_eq!(results.get("disk"), Some(&Outcome::healthy()));
        assert_eq!(results.get("net"), Some(&Outcome::unhealthy("unreachable")));
        assert!(results.failed());
        assert_eq!(results.status_code(), 500);
    }

    #[tokio::test]
    async fn test_error_context_chain_in_message() {
        use eyre::WrapErr;
        let probes = ProbeSet::new()
            .with(
                "config",
                probe_fn(|_| async {
                    std::fs::read("/definitely/not/here")
                        .map(|_| ())
                        .wrap_err("cannot read config")
                }),
            )
            .unwrap();
        let results = ProbeRunner::from_probes(probes).run().await;
        let message = results.get("config").unwrap().message();
        assert!(message.starts_with("cannot read config: "));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let probes = ProbeSet::new()
            .with("ok", healthy())
            .unwrap()
            .with("boom", probe_fn(|_| async { panic!("OH. MY. GOD.") }))
            .unwrap();
        let results = ProbeRunner::from_probes(probes).run().await;

        assert_eq!(results.len(), 2);
        assert!(results.get("ok").unwrap().healthy);
        let boom = results.get("boom").unwrap();
        assert!(!boom.healthy);
        assert_eq!(boom.message(), "OH. MY. GOD.");
        assert!(!boom.diagnostic().is_empty());
    }

    fn thread_blocking(hold: Duration) -> impl Probe {
        probe_fn(move |_| async move {
            std::thread::sleep(hold);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_stalled_probe_hits_deadline() {
        let probes = ProbeSet::new()
            .with("fast", healthy())
            .unwrap()
            .with("stuck", stalled())
            .unwrap();
        let runner = ProbeRunner::new(RunnerConfig::new(probes).with_timeout(Duration::from_millis(300)));

        let started = std::time::Instant::now();
        let results = runner.run().await;
        assert!(started.elapsed() < Duration::from_millis(1000));

        assert!(results.get("fast").unwrap().healthy);
        assert_eq!(results.get("stuck"), Some(&Outcome::unhealthy(DEADLINE_EXCEEDED)));
    }

    #[tokio::test]
    async fn test_context_cancelled_at_deadline() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<()>();
        let probes = ProbeSet::new()
            .with(
                "polite",
                probe_fn(move |ctx: ProbeContext| {
                    let seen_tx = seen_tx.clone();
                    async move {
                        ctx.cancelled().await;
                        let _ = seen_tx.send(());
                        eyre::bail!("gave up")
                    }
                }),
            )
            .unwrap();
        let runner = ProbeRunner::new(RunnerConfig::new(probes).with_timeout(Duration::from_millis(100)));

        let results = runner.run().await;
        assert_eq!(results.get("polite").unwrap().message(), DEADLINE_EXCEEDED);

        tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_thread_blocking_checks_cannot_starve_deadline() {
        let probes = ProbeSet::new()
            .with("b0", thread_blocking(Duration::from_secs(1)))
            .unwrap()
            .with("b1", thread_blocking(Duration::from_secs(1)))
            .unwrap()
            .with("b2", thread_blocking(Duration::from_secs(1)))
            .unwrap()
            .with("ok", healthy())
            .unwrap();
        let runner = ProbeRunner::new(RunnerConfig::new(probes).with_timeout(Duration::from_millis(200)));

        let started = std::time::Instant::now();
        let results = runner.run().await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(800), "run took {:?}", elapsed);
        assert!(results.get("ok").unwrap().healthy);
        for name in ["b0", "b1", "b2"] {
            assert_eq!(results.get(name).unwrap().message(), DEADLINE_EXCEEDED);
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_thread_blocking_check_on_current_thread_runtime() {
        let probes = ProbeSet::new()
            .with("blocks", thread_blocking(Duration::from_secs(1)))
            .unwrap()
            .with("ok", healthy())
            .unwrap();
        let runner = ProbeRunner::new(RunnerConfig::new(probes).with_timeout(Duration::from_millis(200)));

        let started = std::time::Instant::now();
        let results = runner.run().await;

        assert!(started.elapsed() < Duration::from_millis(800));
        assert!(results.get("ok").unwrap().healthy);
        assert_eq!(results.get("blocks").unwrap().message(), DEADLINE_EXCEEDED);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_late_completion_is_not_recorded() {
        let probes = ProbeSet::new()
            .with("late", thread_blocking(Duration::from_millis(400)))
            .unwrap();
        let runner = ProbeRunner::new(RunnerConfig::new(probes).with_timeout(Duration::from_millis(100)));

        let results = runner.run().await;
        assert_eq!(results.get("late"), Some(&Outcome::unhealthy(DEADLINE_EXCEEDED)));
    }

    #[tokio::test]
    async fn test_parent_cancellation_ends_run() {
        let parent = CancellationToken::new();
        let probes = ProbeSet::new().with("stuck", stalled()).unwrap();
        let runner = ProbeRunner::new(
            RunnerConfig::new(probes)
                .with_timeout(Duration::from_secs(30))
                .with_parent(parent.clone()),
        );

        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        parent.cancel();

        let results = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(results.get("stuck").unwrap().message(), CONTEXT_CANCELED);
    }

    #[tokio::test]
    async fn test_failure_logger_called_once_per_failure() {
        let calls: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();

        let probes = ProbeSet::new()
            .with("disk", healthy())
            .unwrap()
            .with("net", failing("unreachable"))
            .unwrap()
            .with("stuck", stalled())
            .unwrap();
        let runner = ProbeRunner::new(
            RunnerConfig::new(probes)
                .with_timeout(Duration::from_millis(100))
                .with_failure_logger(move |name, message, _diagnostic| {
                    sink.lock()
                        .unwrap()
                        .push((name.to_string(), message.to_string()));
                    let _ = done_tx.send(());
                }),
        );

        let results = runner.run().await;
        assert_eq!(results.len(), 3);

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
                .await
                .unwrap();
        }
        let mut calls = calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("net".to_string(), "unreachable".to_string()),
                ("stuck".to_string(), DEADLINE_EXCEEDED.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_slow_failure_logger_does_not_delay_run() {
        let probes = ProbeSet::new().with("net", failing("unreachable")).unwrap();
        let runner = ProbeRunner::new(
            RunnerConfig::new(probes)
                .with_timeout(Duration::from_millis(200))
                .with_failure_logger(|_, _, _| std::thread::sleep(Duration::from_secs(1))),
        );

        let started = std::time::Instant::now();
        let results = runner.run().await;
        assert!(started.elapsed() < Duration::from_millis(800));
        assert!(results.failed());
    }
}
