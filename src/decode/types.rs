//! Decoder types
//!
//! Feed flavours and the shape of a decoded block listing.

use crate::types::BlockRef;
use serde::{Deserialize, Serialize};

/// Syndication format of a feed body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// Atom `<feed>` with `<entry>` elements
    Atom,
    /// RSS 2.0 `<rss>` with `<item>` elements
    Rss,
}

impl FeedFormat {
    /// Guess the format from the document's root element
    pub fn detect(body: &str) -> Option<Self> {
        let head: String = body.chars().take(2048).collect::<String>().to_lowercase();
        if head.contains("<feed") {
            Some(Self::Atom)
        } else if head.contains("<rss") || head.contains("<channel") {
            Some(Self::Rss)
        } else {
            None
        }
    }

    /// Element wrapping one entry
    pub fn entry_element(self) -> &'static str {
        match self {
            Self::Atom => "entry",
            Self::Rss => "item",
        }
    }
}

/// One page of a block-children listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPage {
    /// Blocks on this page
    pub blocks: Vec<BlockRef>,
    /// Cursor for the next page
    pub next_cursor: Option<String>,
    /// Whether more pages follow
    pub has_more: bool,
}
