//! Static asset probe - the UI cannot render without its files.

use std::path::PathBuf;

use async_trait::async_trait;
use eyre::{Context, bail};

use crate::health::{Probe, ProbeContext};

/// Assets the UI tier always serves
pub const DEFAULT_ASSETS: &[&str] = &[
    "grim-reaper.png",
    "dog.png",
    "jquery.min.js",
    "dog.css",
    "index.html",
    "jquery-rotate.min.js",
];

/// Dogs on the ballot; each needs `<name>.png` in the static directory
pub const DEFAULT_DOGS: &[&str] = &["amit", "cameron", "dan", "HD", "mike", "prashanth", "reuben"];

/// Image file served for a dog
pub fn dog_image(dog: &str) -> String {
    format!("{}.png", dog)
}

/// Default assets plus one image per default dog
pub fn default_required_files() -> Vec<String> {
    DEFAULT_ASSETS
        .iter()
        .map(|f| f.to_string())
        .chain(DEFAULT_DOGS.iter().map(|dog| dog_image(dog)))
        .collect()
}

/// Checks that a static directory exists and holds every required file.
#[derive(Debug, Clone)]
pub struct StaticFilesProbe {
    root: PathBuf,
    required: Vec<String>,
}

impl StaticFilesProbe {
    /// Probe `root` for the given file names
    pub fn new(root: impl Into<PathBuf>, required: Vec<String>) -> Self {
        Self {
            root: root.into(),
            required,
        }
    }

    /// Probe `root` for [`default_required_files`]
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self::new(root, default_required_files())
    }

    /// Directory being checked
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl Probe for StaticFilesProbe {
    async fn check(&self, ctx: ProbeContext) -> eyre::Result<()> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("Static path {} is not accessible", self.root.display()))?;
        if !meta.is_dir() {
            bail!("Static path is not a directory");
        }

        for file in &self.required {
            if ctx.is_cancelled() {
                bail!("cancelled while checking static files");
            }
            let path = self.root.join(file);
            tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("Missing static file {}", path.display()))?;
        }
        Ok(())
    }
}
