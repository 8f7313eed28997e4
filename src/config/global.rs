//! Global configuration.
//!
//! Loaded from .topdog.yml or ~/.config/topdog/topdog.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use topdog::probes::{DEFAULT_ASSETS, DEFAULT_DOGS, dog_image};

/// Global configuration for topdog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Health runner settings.
    pub health: HealthConfig,

    /// Static asset settings.
    #[serde(rename = "static")]
    pub static_files: StaticConfig,

    /// Backend tier settings.
    pub backend: BackendConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .topdog.yml in current directory
    /// 3. ~/.config/topdog/topdog.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project config
        let project_config = PathBuf::from(".topdog.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .topdog.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .topdog.yml: {}", e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("topdog").join("topdog.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            eyre::bail!("server.port must be > 0");
        }
        if self.static_files.path.as_os_str().is_empty() {
            eyre::bail!("static.path must not be empty");
        }
        if self.backend.probe && self.backend.url.is_empty() {
            eyre::bail!("backend.url is required when backend.probe is enabled");
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,

    /// How long in-flight requests may drain after a shutdown signal.
    #[serde(rename = "shutdown-grace-ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Health runner settings.
///
/// Zero durations fall back to the runner defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Budget for one probe run in milliseconds.
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Interval between background runs in milliseconds.
    #[serde(rename = "frequency-ms")]
    pub frequency_ms: u64,

    /// Serve cached background results instead of running per request.
    pub scheduled: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            frequency_ms: 60_000,
            scheduled: false,
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency_ms)
    }
}

/// Static asset settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Directory holding the UI assets.
    pub path: PathBuf,

    /// Files that must exist under `path`.
    #[serde(rename = "required-files")]
    pub required_files: Vec<String>,

    /// Dogs on the ballot; each needs `<name>.png` under `path`.
    pub dogs: Vec<String>,
}

impl StaticConfig {
    /// Every file the static probe checks: `required-files` then dog images.
    pub fn required(&self) -> Vec<String> {
        self.required_files
            .iter()
            .cloned()
            .chain(self.dogs.iter().map(|dog| dog_image(dog)))
            .collect()
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("static"),
            required_files: DEFAULT_ASSETS.iter().map(|f| f.to_string()).collect(),
            dogs: DEFAULT_DOGS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Backend tier settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    pub url: String,

    /// Register a probe that queries the backend.
    pub probe: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            probe: false,
        }
    }
}

impl BackendConfig {
    /// Endpoint the backend probe queries
    pub fn endpoint(&self) -> String {
        format!("{}/backend", self.url.trim_end_matches('/'))
    }
}
