//! Configuration system for topdog.
//!
//! A single YAML file (explicit path, ./.topdog.yml or
//! ~/.config/topdog/topdog.yml) layered under command-line overrides.

use eyre::Result;
use std::path::PathBuf;

pub use self::global::GlobalConfig;

mod global;

pub type Config = GlobalConfig;

/// Load configuration from the standard search paths.
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    GlobalConfig::load(explicit_path)
}

/// Apply command-line overrides on top of a loaded config.
pub fn apply_overrides(
    config: &mut GlobalConfig,
    static_path: Option<&PathBuf>,
    backend: Option<&str>,
    port: Option<u16>,
) {
    if let Some(path) = static_path {
        config.static_files.path = path.clone();
    }
    if let Some(url) = backend {
        config.backend.url = url.to_string();
        config.backend.probe = true;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
}
