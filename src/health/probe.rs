//! Probe capability and the named probe registry.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;
use std::sync::Arc;

use super::context::ProbeContext;
use crate::error::{Result, TopdogError};

/// A single named health test.
///
/// Return `Ok(())` when healthy. The error text becomes the outcome message.
/// Implementations should watch `ctx` and bail out once it is cancelled.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Run the check once
    async fn check(&self, ctx: ProbeContext) -> eyre::Result<()>;
}

/// Adapter turning an async closure into a [`Probe`]
pub struct FnProbe<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = eyre::Result<()>> + Send + 'static,
{
    async fn check(&self, ctx: ProbeContext) -> eyre::Result<()> {
        (self.func)(ctx).await
    }
}

/// Wrap an async closure as a probe.
///
/// ```
/// use topdog::health::{probe_fn, ProbeSet};
///
/// let mut probes = ProbeSet::new();
/// probes
///     .add("always", probe_fn(|_ctx| async { Ok(()) }))
///     .unwrap();
/// assert_eq!(probes.len(), 1);
/// ```
pub fn probe_fn<F, Fut>(func: F) -> FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = eyre::Result<()>> + Send + 'static,
{
    FnProbe { func }
}

/// Named set of probes, fixed once handed to a runner.
#[derive(Clone, Default)]
pub struct ProbeSet {
    probes: BTreeMap<String, Arc<dyn Probe>>,
}

impl ProbeSet {
    /// Create an empty probe set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe under a unique name.
    ///
    /// Fails with [`TopdogError::DuplicateProbe`] if the name is taken.
    pub fn add(&mut self, name: impl Into<String>, probe: impl Probe + 'static) -> Result<()> {
        self.add_shared(name, Arc::new(probe))
    }

    /// Register an already shared probe under a unique name
    pub fn add_shared(&mut self, name: impl Into<String>, probe: Arc<dyn Probe>) -> Result<()> {
        match self.probes.entry(name.into()) {
            Entry::Occupied(entry) => Err(TopdogError::DuplicateProbe(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(probe);
                Ok(())
            }
        }
    }

    /// Builder-style [`ProbeSet::add`]
    pub fn with(mut self, name: impl Into<String>, probe: impl Probe + 'static) -> Result<Self> {
        self.add(name, probe)?;
        Ok(self)
    }

    /// Number of registered probes
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probes are registered
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.probes.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Probe>)> {
        self.probes.iter()
    }
}

impl std::fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.probes.keys()).finish()
    }
}
