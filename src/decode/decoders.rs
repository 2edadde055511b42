//! Feed decoder
//!
//! Pulls entries out of Atom and RSS documents with a handful of regexes.
//! Only the fields an [`Item`] needs are extracted.

use super::types::FeedFormat;
use crate::error::{Error, Result};
use crate::types::{Item, OptionStringExt};
use regex::Regex;
use std::sync::LazyLock;

// ============================================================================
// Patterns
// ============================================================================

static CDATA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#(x?)([0-9a-fA-F]+);").unwrap());
static ATOM_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<link\b[^>]*?href\s*=\s*"([^"]*)""#).unwrap());
static AUTHOR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<author\b[^>]*>.*?<name>(.*?)</name>").unwrap());

/// `<name ...>(content)</name>`, non-greedy across lines
fn element_pattern(name: &str) -> Regex {
    let escaped = regex::escape(name);
    Regex::new(&format!(r"(?s)<{escaped}(?:\s[^>]*)?>(.*?)</{escaped}>")).unwrap()
}

static ENTRY: LazyLock<Regex> = LazyLock::new(|| element_pattern("entry"));
static RSS_ITEM: LazyLock<Regex> = LazyLock::new(|| element_pattern("item"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| element_pattern("title"));
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| element_pattern("yt:videoId"));
static ATOM_ID: LazyLock<Regex> = LazyLock::new(|| element_pattern("id"));
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| element_pattern("published"));
static UPDATED: LazyLock<Regex> = LazyLock::new(|| element_pattern("updated"));
static GUID: LazyLock<Regex> = LazyLock::new(|| element_pattern("guid"));
static RSS_LINK: LazyLock<Regex> = LazyLock::new(|| element_pattern("link"));
static PUB_DATE: LazyLock<Regex> = LazyLock::new(|| element_pattern("pubDate"));
static DC_CREATOR: LazyLock<Regex> = LazyLock::new(|| element_pattern("dc:creator"));

// ============================================================================
// Feed Decoder
// ============================================================================

/// Decodes Atom and RSS feeds into items, newest first as listed
#[derive(Debug, Clone, Default)]
pub struct FeedDecoder {
    /// Origin to use when the feed names none
    fallback_origin: Option<String>,
}

impl FeedDecoder {
    /// Create a new feed decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `origin` for entries when the feed has no title or author
    #[must_use]
    pub fn with_fallback_origin(mut self, origin: impl Into<String>) -> Self {
        self.fallback_origin = Some(origin.into());
        self
    }

    /// Decode a feed body.
    ///
    /// Entries without any usable identifier are dropped.
    pub fn decode(&self, body: &str) -> Result<Vec<Item>> {
        let format = FeedFormat::detect(body)
            .ok_or_else(|| Error::feed("Document is neither an Atom nor an RSS feed"))?;

        let entries: &Regex = match format {
            FeedFormat::Atom => &*ENTRY,
            FeedFormat::Rss => &*RSS_ITEM,
        };

        let header_end = entries.find(body).map_or(body.len(), |m| m.start());
        let origin = feed_origin(&body[..header_end])
            .or_else(|| self.fallback_origin.clone())
            .unwrap_or_else(|| "Unknown source".to_string());

        let items = entries
            .captures_iter(body)
            .filter_map(|caps| {
                let entry = caps.get(1).map_or("", |m| m.as_str());
                match format {
                    FeedFormat::Atom => atom_entry(entry, &origin),
                    FeedFormat::Rss => rss_item(entry, &origin),
                }
            })
            .collect();
        Ok(items)
    }
}

fn feed_origin(header: &str) -> Option<String> {
    capture(&AUTHOR_NAME, header).or_else(|| capture(&TITLE, header))
}

fn atom_entry(entry: &str, origin: &str) -> Option<Item> {
    let id = capture(&VIDEO_ID, entry).or_else(|| {
        capture(&ATOM_ID, entry).map(|id| match id.strip_prefix("yt:video:") {
            Some(stripped) => stripped.to_string(),
            None => id,
        })
    })?;
    let title = capture(&TITLE, entry).unwrap_or_else(|| "Untitled".to_string());
    let published = capture(&PUBLISHED, entry)
        .or_else(|| capture(&UPDATED, entry))
        .unwrap_or_default();
    let origin = capture(&AUTHOR_NAME, entry).unwrap_or_else(|| origin.to_string());

    let mut item = Item::new(id, title, origin, published);
    if let Some(link) = capture(&ATOM_LINK, entry) {
        item = item.with_url(link);
    }
    Some(item)
}

fn rss_item(entry: &str, origin: &str) -> Option<Item> {
    let link = capture(&RSS_LINK, entry);
    let id = capture(&GUID, entry).or_else(|| link.clone())?;
    let title = capture(&TITLE, entry).unwrap_or_else(|| "Untitled".to_string());
    let published = capture(&PUB_DATE, entry).unwrap_or_default();
    let origin = capture(&DC_CREATOR, entry).unwrap_or_else(|| origin.to_string());

    let mut item = Item::new(id, title, origin, published);
    if let Some(link) = link {
        item = item.with_url(link);
    }
    Some(item)
}

/// First capture group of `re` in `haystack`, unescaped and trimmed
fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_text(m.as_str()))
        .and_then(OptionStringExt::none_if_blank)
}

/// Unwrap CDATA sections and decode XML entities
pub fn decode_text(raw: &str) -> String {
    let unwrapped = CDATA.replace_all(raw.trim(), "$1");
    let numeric = NUMERIC_ENTITY.replace_all(&unwrapped, |caps: &regex::Captures<'_>| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
