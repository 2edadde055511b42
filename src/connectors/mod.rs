//! Built-in connectors
//!
//! Concrete discovery, transformation and store implementations, and the
//! factories that pick between them from configuration.

mod feed;
mod gemini;
mod notion;
mod youtube;

pub use feed::FeedDiscovery;
pub use gemini::{
    FileRef, GeminiClient, UploadTransformer, UploadedFile, UrlTransformer, GEMINI_API_BASE,
};
pub use notion::{encode_block, rich_text, NotionStore, NOTION_API_BASE, NOTION_VERSION};
pub use youtube::{YouTubeDiscovery, YOUTUBE_API_BASE};

use crate::config::{Credentials, DiscoveryKind, PipelineConfig, TransformKind};
use crate::connector::{Discovery, DocumentStore, Transformer};
use crate::engine::Pipeline;
use crate::error::Result;
use std::sync::Arc;

/// Discovery connector selected by `discovery.kind`
pub fn discovery_from_config(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn Discovery>> {
    Ok(match config.discovery.kind {
        DiscoveryKind::Search => Arc::new(YouTubeDiscovery::new(credentials.require_youtube_key()?)?),
        DiscoveryKind::Feed => Arc::new(FeedDiscovery::new(
            config.discovery.feed_url_template.clone(),
        )?),
    })
}

/// Transformation connector selected by `transform.kind`
pub fn transformer_from_config(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn Transformer>> {
    let client = GeminiClient::new(&credentials.gemini_api_key, config.transform.model.clone())?;
    Ok(match config.transform.kind {
        TransformKind::Url => Arc::new(UrlTransformer::new(client, config)),
        TransformKind::Upload => Arc::new(UploadTransformer::new(client, &config.transform)?),
    })
}

/// Destination store connector
pub fn store_from_config(
    config: &PipelineConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn DocumentStore>> {
    Ok(Arc::new(NotionStore::new(
        &credentials.notion_token,
        credentials.notion_database_id.clone(),
        config.store.properties.clone(),
    )?))
}

/// A pipeline wired to the configured connectors
pub fn build_pipeline(config: PipelineConfig, credentials: &Credentials) -> Result<Pipeline> {
    let discovery = discovery_from_config(&config, credentials)?;
    let transformer = transformer_from_config(&config, credentials)?;
    let store = store_from_config(&config, credentials)?;
    Ok(Pipeline::new(config, discovery, transformer, store))
}
