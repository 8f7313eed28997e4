//! Concurrent health checking
//!
//! - [`ProbeRunner`] runs a fixed set of named probes in parallel under a
//!   deadline and always returns a complete [`ResultSet`]
//! - [`ScheduledProbeRunner`] repeats that on a timer and serves the latest
//!   result set to any number of readers

pub mod context;
pub mod outcome;
pub mod panic;
pub mod probe;
pub mod runner;
pub mod scheduled;

pub use context::ProbeContext;
pub use outcome::{Outcome, ResultSet};
pub use probe::{FnProbe, Probe, ProbeSet, probe_fn};
pub use runner::{
    CONTEXT_CANCELED, DEADLINE_EXCEEDED, DEFAULT_TIMEOUT, FailureLogger, ProbeRunner, RunnerConfig,
};
pub use scheduled::{DEFAULT_FREQUENCY, ScheduledProbeRunner};
