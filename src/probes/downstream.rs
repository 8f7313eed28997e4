//! Downstream reachability probe.

use async_trait::async_trait;
use eyre::bail;
use reqwest::header::HeaderMap;

use crate::health::{Probe, ProbeContext};
use crate::query::DownstreamClient;

/// Healthy when the downstream tier answers a query with a decodable vote.
#[derive(Debug, Clone)]
pub struct DownstreamProbe {
    client: DownstreamClient,
    url: String,
}

impl DownstreamProbe {
    /// Probe `url` through `client`
    pub fn new(client: DownstreamClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// URL being queried
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for DownstreamProbe {
    async fn check(&self, ctx: ProbeContext) -> eyre::Result<()> {
        let inbound = HeaderMap::new();
        tokio::select! {
            _ = ctx.cancelled() => bail!("cancelled while querying {}", self.url),
            result = self.client.query(&self.url, &inbound) => {
                let response = result?;
                tracing::debug!(url = %self.url, top_dog = %response.top_dog, "Downstream answered");
                Ok(())
            }
        }
    }
}
