//! Downstream query - GET a lower tier and decode its JSON answer
//!
//! The UI tier queries the midtier and the midtier queries the backend. Trace
//! headers from the inbound request ride along on every hop.

pub mod headers;

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TopdogError};

pub use headers::{PROPAGATED_HEADERS, copy_trace_headers};

/// Overall timeout for one downstream request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle keep-alive connections kept per downstream host
pub const MAX_IDLE_PER_HOST: usize = 10;

/// Answer produced by the backend tier and decorated by the tiers above it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    /// Winning vote
    pub top_dog: String,

    /// Version of the backend tier that voted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_version: Option<u32>,

    /// Version of the midtier that relayed the vote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midtier_version: Option<u32>,

    /// Version of the UI tier that served the vote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_version: Option<u32>,
}

/// HTTP client for querying a downstream tier.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    client: Client,
}

impl DownstreamClient {
    /// Create a client with pooled keep-alive connections
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// GET `url`, forwarding trace headers from `inbound`.
    ///
    /// Non-2xx answers become [`TopdogError::Downstream`] carrying the body.
    pub async fn query(&self, url: &str, inbound: &HeaderMap) -> Result<BackendResponse> {
        let mut headers = HeaderMap::new();
        copy_trace_headers(inbound, &mut headers);

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .inspect_err(|e| tracing::warn!(url, error = %e, "HTTP request error"))?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            tracing::warn!(url, status = status.as_u16(), body = %body, "HTTP error from downstream");
            return Err(TopdogError::Downstream {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&body)
            .inspect_err(|e| tracing::warn!(url, error = %e, "Unable to parse downstream JSON"))
            .map_err(TopdogError::from)
    }
}
