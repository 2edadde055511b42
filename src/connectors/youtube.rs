//! Search-API discovery
//!
//! Resolves a channel handle to its uploads playlist and lists the newest
//! uploads: `search` → `channels` → `playlistItems`.

use crate::auth::AuthConfig;
use crate::connector::Discovery;
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::types::Item;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default API root
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";

/// The API refuses larger pages
const MAX_PAGE_SIZE: usize = 50;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResponse<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    channel_id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Channel {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    published_at: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

// ============================================================================
// Connector
// ============================================================================

/// Discovers a channel's newest uploads by handle
#[derive(Debug)]
pub struct YouTubeDiscovery {
    client: HttpClient,
}

impl YouTubeDiscovery {
    /// Create a connector against the public API
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(YOUTUBE_API_BASE, api_key)
    }

    /// Create a connector against another API root
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        let builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(30))
            .max_retries(3);
        let client = HttpClient::with_config(AuthConfig::query_key("key", api_key).apply(builder).build())?;
        Ok(Self { client })
    }

    /// Channel id and title for a handle, if the search finds one
    async fn resolve_channel(&self, handle: &str) -> Result<Option<SearchSnippet>> {
        let response: ListResponse<SearchResult> = self
            .client
            .get_json(
                "search",
                RequestConfig::new()
                    .query("part", "snippet")
                    .query("q", handle)
                    .query("type", "channel")
                    .query("maxResults", "1"),
            )
            .await?;
        Ok(response.items.into_iter().next().map(|r| r.snippet))
    }

    async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>> {
        let response: ListResponse<Channel> = self
            .client
            .get_json(
                "channels",
                RequestConfig::new()
                    .query("part", "contentDetails")
                    .query("id", channel_id),
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads))
    }

    async fn playlist_items(&self, playlist_id: &str, limit: usize) -> Result<Vec<PlaylistSnippet>> {
        let response: ListResponse<PlaylistItem> = self
            .client
            .get_json(
                "playlistItems",
                RequestConfig::new()
                    .query("part", "snippet")
                    .query("playlistId", playlist_id)
                    .query("maxResults", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
            )
            .await?;
        Ok(response.items.into_iter().map(|i| i.snippet).collect())
    }
}

#[async_trait]
impl Discovery for YouTubeDiscovery {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn list_recent(&self, source: &str, limit: usize) -> Result<Vec<Item>> {
        let Some(channel) = self.resolve_channel(source).await? else {
            info!(source, "Channel not found");
            return Ok(Vec::new());
        };
        debug!(source, channel_id = %channel.channel_id, "Resolved channel");

        let Some(playlist) = self.uploads_playlist(&channel.channel_id).await? else {
            info!(source, channel_id = %channel.channel_id, "Channel has no uploads playlist");
            return Ok(Vec::new());
        };

        let items = self
            .playlist_items(&playlist, limit)
            .await?
            .into_iter()
            .filter_map(|snippet| {
                let id = snippet.resource_id.video_id?;
                Some(Item::new(id, snippet.title, channel.title.clone(), snippet.published_at))
            })
            .take(limit)
            .collect();
        Ok(items)
    }
}
