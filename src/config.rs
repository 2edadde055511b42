//! Pipeline configuration
//!
//! The pipeline is described by a YAML file: which sources to poll, which
//! discovery and transformation connectors to use, the retry policy, and
//! the layout limits of the destination store. Secrets come from the
//! environment via [`Credentials`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Pipeline Config
// ============================================================================

/// Complete pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source handles to poll (channel handles, feed channel ids)
    pub sources: Vec<String>,

    /// Discovery connector settings
    pub discovery: DiscoveryConfig,

    /// Transformation connector settings
    pub transform: TransformConfig,

    /// Retry and throttling policy for transformation calls
    pub retry: RetryPolicy,

    /// Destination store layout
    pub store: StoreConfig,

    /// URL for an item identifier; `{id}` is replaced
    pub item_url_template: String,

    /// Stop after this many work units in one run
    pub max_items_per_run: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            discovery: DiscoveryConfig::default(),
            transform: TransformConfig::default(),
            retry: RetryPolicy::default(),
            store: StoreConfig::default(),
            item_url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            max_items_per_run: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the store or scheduler cannot honor
    pub fn validate(&self) -> Result<()> {
        let store = &self.store;
        if store.fragment_max == 0 {
            return Err(Error::invalid_value("store.fragment_max", "must be > 0"));
        }
        if store.summary_cap <= 3 {
            return Err(Error::invalid_value("store.summary_cap", "must be > 3"));
        }
        if store.first_batch_cap == 0 {
            return Err(Error::invalid_value("store.first_batch_cap", "must be > 0"));
        }
        if store.subsequent_batch_cap == 0 {
            return Err(Error::invalid_value(
                "store.subsequent_batch_cap",
                "must be > 0",
            ));
        }
        if store.first_batch_cap + LEADING_BLOCKS > store.subsequent_batch_cap {
            return Err(Error::invalid_value(
                "store.first_batch_cap",
                format!(
                    "first batch plus {LEADING_BLOCKS} leading blocks exceeds the per-request limit of {}",
                    store.subsequent_batch_cap
                ),
            ));
        }
        store.properties.validate()?;

        if self.discovery.per_source_limit == 0 {
            return Err(Error::invalid_value(
                "discovery.per_source_limit",
                "must be > 0",
            ));
        }
        if self.discovery.kind == DiscoveryKind::Feed
            && !self.discovery.feed_url_template.contains("{source}")
        {
            return Err(Error::invalid_value(
                "discovery.feed_url_template",
                "must contain {source}",
            ));
        }
        if self.transform.kind == TransformKind::Upload
            && self.transform.media_url_template.is_none()
        {
            return Err(Error::missing_field("transform.media_url_template"));
        }
        Ok(())
    }

    /// Canonical URL for an item identifier
    pub fn item_url(&self, id: &str) -> String {
        render_id(&self.item_url_template, id)
    }
}

/// Substitute `{id}` in a URL template
pub fn render_id(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

/// Heading and divider blocks that precede every record's content
pub const LEADING_BLOCKS: usize = 2;

// ============================================================================
// Discovery
// ============================================================================

/// Which discovery connector produces items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    /// Resolve handles through the search API
    #[default]
    Search,
    /// Poll a feed per source
    Feed,
}

/// Discovery connector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Connector to use
    pub kind: DiscoveryKind,
    /// Newest items to fetch per source
    pub per_source_limit: usize,
    /// Feed URL; `{source}` is replaced with the source handle
    pub feed_url_template: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            kind: DiscoveryKind::Search,
            per_source_limit: 5,
            feed_url_template: "https://www.youtube.com/feeds/videos.xml?channel_id={source}"
                .to_string(),
        }
    }
}

// ============================================================================
// Transformation
// ============================================================================

/// Which transformation connector enriches items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Hand the item URL to the model directly
    #[default]
    Url,
    /// Download the media, upload it, then reference the uploaded file
    Upload,
}

/// Transformation connector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Connector to use
    pub kind: TransformKind,
    /// Model name
    pub model: String,
    /// Prompt producing the summary
    pub summary_prompt: String,
    /// Prompt producing the full content
    pub content_prompt: String,
    /// Media download URL for upload mode; `{id}` is replaced
    pub media_url_template: Option<String>,
    /// MIME type of downloaded media
    pub media_mime_type: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            kind: TransformKind::Url,
            model: "gemini-2.5-flash".to_string(),
            summary_prompt:
                "Provide a 2-3 sentence summary of the main topics discussed in this video."
                    .to_string(),
            content_prompt: "Generate a complete transcript of this video with:\n\
                - Paragraph breaks for readability\n\
                - Speaker labels if multiple speakers\n\
                - Timestamps where helpful\n\
                - Mark ads/sponsors as [AD]"
                .to_string(),
            media_url_template: None,
            media_mime_type: "audio/mpeg".to_string(),
        }
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Retry and throttling policy for the transformation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Rate-limited attempts that are followed by a backoff and another try
    pub max_attempts: u32,
    /// Backoff base; attempt `n` waits `base * 2^n` plus jitter
    pub base_delay_ms: u64,
    /// Upper bound (exclusive) of the uniform jitter added to each backoff
    pub jitter_ms: u64,
    /// Fixed pause before every transformation call
    pub throttle_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            jitter_ms: 1_000,
            throttle_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff base as a duration
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Jitter unit as a duration
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    /// Throttle delay as a duration
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// A policy with no waiting at all, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            jitter_ms: 0,
            throttle_ms: 0,
        }
    }
}

// ============================================================================
// Store Layout
// ============================================================================

/// Destination store layout limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum characters per content fragment
    pub fragment_max: usize,
    /// Maximum characters in the summary property
    pub summary_cap: usize,
    /// Content fragments written inline at creation
    pub first_batch_cap: usize,
    /// Content fragments per follow-up append call
    pub subsequent_batch_cap: usize,
    /// Pause between successive append calls
    pub append_pause_ms: u64,
    /// Text of the heading block
    pub heading: String,
    /// Property names in the store schema
    pub properties: PropertyNames,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fragment_max: 2_000,
            summary_cap: 2_000,
            first_batch_cap: 98,
            subsequent_batch_cap: 100,
            append_pause_ms: 300,
            heading: "Full Transcript".to_string(),
            properties: PropertyNames::default(),
        }
    }
}

impl StoreConfig {
    /// Append pause as a duration
    pub fn append_pause(&self) -> Duration {
        Duration::from_millis(self.append_pause_ms)
    }
}

/// Names of the store properties each field maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyNames {
    /// Item identifier (rich text)
    pub identifier: String,
    /// Summary / status text (rich text)
    pub summary: String,
    /// Item title (rich text)
    pub title: String,
    /// Item origin (the store's title column)
    pub origin: String,
    /// Publication date (date)
    pub date: String,
    /// Item URL (url)
    pub url: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            identifier: "Video ID".to_string(),
            summary: "Summary".to_string(),
            title: "Title".to_string(),
            origin: "Channel".to_string(),
            date: "Date".to_string(),
            url: "URL".to_string(),
        }
    }
}

impl PropertyNames {
    fn validate(&self) -> Result<()> {
        let named = [
            ("identifier", &self.identifier),
            ("summary", &self.summary),
            ("title", &self.title),
            ("origin", &self.origin),
            ("date", &self.date),
            ("url", &self.url),
        ];
        for (field, name) in named {
            if name.trim().is_empty() {
                return Err(Error::invalid_value(
                    format!("store.properties.{field}"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// API credentials read from the environment
#[derive(Clone)]
pub struct Credentials {
    /// Transformation service key
    pub gemini_api_key: String,
    /// Search API key (search discovery only)
    pub youtube_api_key: Option<String>,
    /// Document store token
    pub notion_token: String,
    /// Document store database id
    pub notion_database_id: String,
}

impl Credentials {
    /// Read credentials from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::missing_field(key))
        };
        Ok(Self {
            gemini_api_key: required("GEMINI_API_KEY")?,
            youtube_api_key: lookup("YOUTUBE_API_KEY").filter(|v| !v.trim().is_empty()),
            notion_token: required("NOTION_API_KEY")?,
            notion_database_id: required("NOTION_DATABASE_ID")?,
        })
    }

    /// Search API key, required when discovery uses search
    pub fn require_youtube_key(&self) -> Result<&str> {
        self.youtube_api_key
            .as_deref()
            .ok_or_else(|| Error::missing_field("YOUTUBE_API_KEY"))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"***")
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "***"))
            .field("notion_token", &"***")
            .field("notion_database_id", &self.notion_database_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = PipelineConfig::from_yaml("").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.store.fragment_max, 2_000);
        assert_eq!(config.store.first_batch_cap, 98);
        assert_eq!(config.store.subsequent_batch_cap, 100);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.discovery.per_source_limit, 5);
        assert_eq!(config.item_url("abc"), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
sources: ["@vidiq", "@tubebuddy"]
discovery:
  kind: feed
  per_source_limit: 10
transform:
  kind: upload
  media_url_template: "https://media.example.com/{id}.mp3"
retry:
  max_attempts: 3
  base_delay_ms: 500
store:
  append_pause_ms: 0
  properties:
    identifier: "Item ID"
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.sources, vec!["@vidiq", "@tubebuddy"]);
        assert_eq!(config.discovery.kind, DiscoveryKind::Feed);
        assert_eq!(config.discovery.per_source_limit, 10);
        assert_eq!(config.transform.kind, TransformKind::Upload);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(500));
        assert_eq!(config.retry.jitter_ms, 1_000);
        assert_eq!(config.store.properties.identifier, "Item ID");
        assert_eq!(config.store.properties.summary, "Summary");
    }

    #[test]
    fn test_validate_rejects_oversized_first_batch() {
        let yaml = "store:\n  first_batch_cap: 99\n";
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("store.first_batch_cap"));
    }

    #[test]
    fn test_validate_requires_media_template_for_upload() {
        let err = PipelineConfig::from_yaml("transform:\n  kind: upload\n").unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { .. }));
    }

    #[test]
    fn test_validate_rejects_blank_property_name() {
        let yaml = "store:\n  properties:\n    summary: \" \"\n";
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sources: [\"@mogulmail\"]").unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sources, vec!["@mogulmail"]);

        let missing = PipelineConfig::from_file("/definitely/not/here.yaml");
        assert!(matches!(missing, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_credentials_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "g"),
            ("NOTION_API_KEY", "n"),
            ("NOTION_DATABASE_ID", "db"),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| env.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(creds.notion_database_id, "db");
        assert!(creds.require_youtube_key().is_err());
        assert!(!format!("{creds:?}").contains("\"n\""));

        let err = Credentials::from_lookup(|_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required config field: GEMINI_API_KEY"
        );
    }
}
