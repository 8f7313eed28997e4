//! Execution context handed to every probe in a run.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellable, deadline-bound context shared by all probes of one run.
///
/// The token is cancelled when the deadline fires, when the parent token
/// (if any) is cancelled, or when the run finishes. Probes should watch it
/// and stop early; the runner does not wait for them either way.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    token: CancellationToken,
    deadline: Instant,
}

impl ProbeContext {
    /// Create a context from a token and a deadline
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    /// Context with no parent and the given time budget
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), Instant::now() + timeout)
    }

    /// When the run gives up on outstanding probes
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the run is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Underlying token, for handing to cancellation-aware libraries
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
