//! Error types for topdog
//!
//! Centralized error handling using thiserror. Health probes never surface
//! these to callers of the runner; failures there are reported as data.

use thiserror::Error;

/// All error types that can occur in topdog
#[derive(Debug, Error)]
pub enum TopdogError {
    /// Two probes were registered under the same name
    #[error("Duplicate probe: {0}")]
    DuplicateProbe(String),

    /// Invalid or unusable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Downstream tier answered with a non-2xx status
    #[error("Downstream returned HTTP {status}: {body}")]
    Downstream { status: u16, body: String },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for topdog operations
pub type Result<T> = std::result::Result<T, TopdogError>;
