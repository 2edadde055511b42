//! Feed-polling discovery
//!
//! Fetches one feed per source and decodes its entries. Needs no API key.

use crate::connector::Discovery;
use crate::decode::FeedDecoder;
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::types::Item;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Discovers items by polling a feed URL per source
#[derive(Debug)]
pub struct FeedDiscovery {
    client: HttpClient,
    url_template: String,
}

impl FeedDiscovery {
    /// Create a connector; `{source}` in the template is replaced per source
    pub fn new(url_template: impl Into<String>) -> Result<Self> {
        let client = HttpClient::with_config(
            HttpClientConfig::builder()
                .timeout(Duration::from_secs(30))
                .max_retries(2)
                .build(),
        )?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    /// Feed URL for a source
    pub fn feed_url(&self, source: &str) -> String {
        self.url_template.replace("{source}", source)
    }
}

#[async_trait]
impl Discovery for FeedDiscovery {
    fn name(&self) -> &'static str {
        "feed"
    }

    async fn list_recent(&self, source: &str, limit: usize) -> Result<Vec<Item>> {
        let url = self.feed_url(source);
        let response = match self.client.get(&url, RequestConfig::new()).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                info!(source, "Feed not found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let body = response.text().await?;

        let mut items = FeedDecoder::new()
            .with_fallback_origin(source)
            .decode(&body)?;
        items.truncate(limit);
        Ok(items)
    }
}
