//! Probe outcomes and the per-run result set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// HTTP status reported when every probe is healthy.
pub const STATUS_HEALTHY: u16 = 200;

/// HTTP status reported when at least one probe failed.
pub const STATUS_UNHEALTHY: u16 = 500;

/// Verdict for a single probe in a single run.
///
/// `message` and `diagnostic` are only ever set on unhealthy outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether this part of the service is healthy
    pub healthy: bool,

    /// Short description of what went wrong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Extended detail such as a captured panic backtrace
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl Outcome {
    /// Create a healthy outcome
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            diagnostic: None,
        }
    }

    /// Create an unhealthy outcome with a message
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            diagnostic: None,
        }
    }

    /// Create an unhealthy outcome carrying extended diagnostic text
    pub fn crashed(message: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// Message text, empty when healthy
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Diagnostic text, empty when absent
    pub fn diagnostic(&self) -> &str {
        self.diagnostic.as_deref().unwrap_or_default()
    }
}

/// Map of probe name to outcome for one run.
///
/// Backed by a `BTreeMap` so serialization order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(BTreeMap<String, Outcome>);

impl ResultSet {
    /// Create an empty result set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome, replacing any previous entry for `name`
    pub fn insert(&mut self, name: impl Into<String>, outcome: Outcome) {
        self.0.insert(name.into(), outcome);
    }

    /// Look up the outcome for a probe
    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.0.get(name)
    }

    /// Whether an outcome was recorded for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of recorded outcomes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no outcomes were recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Probe names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over `(name, outcome)` pairs in sorted order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Outcome> {
        self.0.iter()
    }

    /// True if any recorded outcome is unhealthy.
    ///
    /// An empty set has no failures.
    pub fn failed(&self) -> bool {
        self.0.values().any(|outcome| !outcome.healthy)
    }

    /// Names of the unhealthy probes in sorted order
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.0
            .iter()
            .filter(|(_, outcome)| !outcome.healthy)
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// HTTP status code for this result set
    pub fn status_code(&self) -> u16 {
        if self.failed() { STATUS_UNHEALTHY } else { STATUS_HEALTHY }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = (&'a String, &'a Outcome);
    type IntoIter = btree_map::Iter<'a, String, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Outcome)> for ResultSet {
    fn from_iter<I: IntoIterator<Item = (String, Outcome)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
