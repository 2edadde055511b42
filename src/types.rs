//! Common types used throughout ingest-relay
//!
//! Items flow in from discovery, artifacts come out of transformation, and
//! records, fields and blocks describe what lives in the document store.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Failure Markers
// ============================================================================

/// Lowercase substrings in a record's status text that mark it as failed.
pub const FAILURE_MARKERS: &[&str] = &[
    "transcription failed",
    "rate limit exceeded",
    "error:",
    "resource_exhausted",
];

/// The subset of [`FAILURE_MARKERS`] written for throttled transformations.
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit exceeded", "resource_exhausted"];

const RATE_LIMIT_SUMMARY: &str = "Rate limit exceeded.";
const FAILED_SUMMARY: &str = "Transcription failed.";

// ============================================================================
// Item
// ============================================================================

/// A discovered unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable external identifier
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Source name (channel, feed title)
    pub origin: String,
    /// Publication timestamp as reported by the source
    pub published: String,
    /// Canonical URL of the item, when the source provides one
    #[serde(default)]
    pub url: Option<String>,
}

impl Item {
    /// Create a new item
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        origin: impl Into<String>,
        published: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            origin: origin.into(),
            published: published.into(),
            url: None,
        }
    }

    /// Set the item URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Stand-in metadata for a retry whose item was discovered on an earlier run
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self::new(id, "Unknown title", "Unknown source", "")
    }

    /// Publication date, falling back to `fallback` when unparseable
    pub fn published_date(&self, fallback: NaiveDate) -> NaiveDate {
        parse_date(&self.published).unwrap_or(fallback)
    }
}

/// Best-effort timestamp parsing for the formats sources actually emit
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

// ============================================================================
// Work Unit
// ============================================================================

/// A scheduled attempt to process one item in the current run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkUnit {
    /// The item to process
    pub item: Item,
    /// Whether a failed record already exists for this item
    pub is_retry: bool,
    /// Handle of the existing record to update in place
    pub store_reference: Option<String>,
}

impl WorkUnit {
    /// Work on an item with no record in the store yet
    pub fn new(item: Item) -> Self {
        Self {
            item,
            is_retry: false,
            store_reference: None,
        }
    }

    /// Work that overwrites an existing failed record
    pub fn retry(item: Item, store_reference: impl Into<String>) -> Self {
        Self {
            item,
            is_retry: true,
            store_reference: Some(store_reference.into()),
        }
    }

    /// Identifier of the underlying item
    pub fn id(&self) -> &str {
        &self.item.id
    }
}

// ============================================================================
// Artifact
// ============================================================================

/// Outcome class of a transformation, decoded from or encoded into status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Transformation produced real output
    Success,
    /// Transformation was throttled until attempts ran out
    RateLimited,
    /// Transformation failed for any other reason
    OtherError,
}

impl ArtifactStatus {
    /// Classify a record's status text by its failure markers.
    ///
    /// This is the only place stored text is inspected for failure state.
    pub fn decode(status_text: &str) -> Self {
        let lower = status_text.to_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::RateLimited
        } else if FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::OtherError
        } else {
            Self::Success
        }
    }

    /// Whether this status marks a failure
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Output of the transformation step for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Short summary, written to the store's status field
    pub summary: String,
    /// Full content, written as fragments
    pub content: String,
    /// Decoded outcome
    pub status: ArtifactStatus,
}

impl Artifact {
    /// A successful artifact
    pub fn success(summary: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            content: content.into(),
            status: ArtifactStatus::Success,
        }
    }

    /// A throttled artifact carrying the rate-limit sentinel
    pub fn rate_limited(detail: impl std::fmt::Display) -> Self {
        Self {
            summary: RATE_LIMIT_SUMMARY.to_string(),
            content: format!("Error: RESOURCE_EXHAUSTED {detail}"),
            status: ArtifactStatus::RateLimited,
        }
    }

    /// A failed artifact carrying the generic-error sentinel
    pub fn failed(detail: impl std::fmt::Display) -> Self {
        Self {
            summary: FAILED_SUMMARY.to_string(),
            content: format!("Error: {detail}"),
            status: ArtifactStatus::OtherError,
        }
    }

    /// Whether the transformation failed
    pub fn is_failed(&self) -> bool {
        self.status.is_failure()
    }
}

/// Raw result of a transformation connector call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// Short summary
    pub summary: String,
    /// Full content
    pub content: String,
}

// ============================================================================
// Document Store Types
// ============================================================================

/// A content block written under a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Block {
    /// Top-level heading
    Heading(String),
    /// Horizontal divider
    Divider,
    /// Paragraph of text
    Paragraph(String),
}

/// Handle of an existing child block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Store-assigned block id
    pub id: String,
}

/// A property value on a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum Field {
    /// Item identifier
    Identifier(String),
    /// Item title
    Title(String),
    /// Item origin
    Origin(String),
    /// Publication date
    Date(NaiveDate),
    /// Summary / status text
    Summary(String),
    /// Item URL
    Url(String),
}

/// A record to create in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecord {
    /// Record properties
    pub fields: Vec<Field>,
    /// Child blocks written inline at creation
    pub children: Vec<Block>,
}

/// A record as read back from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Opaque handle used for in-place updates
    pub reference: String,
    /// Item identifier, if it could be extracted
    pub identifier: Option<String>,
    /// Status text, if the field was present
    pub status_text: Option<String>,
}

/// One page of a store query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    /// Records on this page
    pub records: Vec<StoreRecord>,
    /// Cursor for the next page
    pub next_cursor: Option<String>,
    /// Whether more pages follow
    pub has_more: bool,
    /// Entries on this page that could not be decoded into a record
    pub malformed: usize,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty or whitespace
    fn none_if_blank(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_blank(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_blank(self) -> Option<String> {
        Some(self).none_if_blank()
    }
}
