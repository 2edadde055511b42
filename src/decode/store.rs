//! Store decoder
//!
//! Reads database query and block listing responses. Property values are
//! looked up by the configured names so a renamed column shows up as a
//! missing value instead of a decode error.

use super::types::BlockPage;
use crate::config::PropertyNames;
use crate::error::{Error, Result};
use crate::types::{BlockRef, OptionStringExt, QueryPage, StoreRecord};
use serde_json::Value;
use tracing::debug;

/// Decodes pages of a store database into [`StoreRecord`]s
#[derive(Debug, Clone, Default)]
pub struct PageDecoder {
    properties: PropertyNames,
}

impl PageDecoder {
    /// Create a decoder reading the given property names
    pub fn new(properties: PropertyNames) -> Self {
        Self { properties }
    }

    /// Decode a database query response
    pub fn decode_query(&self, body: &Value) -> Result<QueryPage> {
        let mut records = Vec::new();
        let mut malformed = 0;
        for page in results(body)? {
            match self.decode_page(page) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!("Skipping undecodable page: {e}");
                    malformed += 1;
                }
            }
        }
        Ok(QueryPage {
            records,
            next_cursor: next_cursor(body),
            has_more: has_more(body),
            malformed,
        })
    }

    /// Decode one page object
    pub fn decode_page(&self, page: &Value) -> Result<StoreRecord> {
        let reference = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::decode("page object without an id"))?
            .to_string();
        let properties = page.get("properties");
        let lookup = |name: &str| properties.and_then(|p| p.get(name)).map(property_text);

        Ok(StoreRecord {
            reference,
            identifier: lookup(&self.properties.identifier).and_then(OptionStringExt::none_if_blank),
            status_text: lookup(&self.properties.summary),
        })
    }
}

/// Decode a block-children listing
pub fn decode_blocks(body: &Value) -> Result<BlockPage> {
    let blocks = results(body)?
        .iter()
        .filter_map(|block| block.get("id").and_then(Value::as_str))
        .map(|id| BlockRef { id: id.to_string() })
        .collect();
    Ok(BlockPage {
        blocks,
        next_cursor: next_cursor(body),
        has_more: has_more(body),
    })
}

/// Id of a created object
pub fn decode_created_id(body: &Value) -> Result<String> {
    body.get("id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| Error::decode("create response without an id"))
}

/// Plain text of a property value, whatever its type
pub fn property_text(property: &Value) -> String {
    let kind = property.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "title" | "rich_text" => property.get(kind).map(rich_text_plain).unwrap_or_default(),
        "url" | "email" | "phone_number" => property
            .get(kind)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "date" => property
            .pointer("/date/start")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "number" => property
            .get("number")
            .filter(|n| !n.is_null())
            .map(ToString::to_string)
            .unwrap_or_default(),
        "select" => property
            .pointer("/select/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Concatenate the segments of a rich text array
pub fn rich_text_plain(segments: &Value) -> String {
    segments
        .as_array()
        .map(|segments| {
            segments
                .iter()
                .filter_map(|s| {
                    s.get("plain_text")
                        .or_else(|| s.pointer("/text/content"))
                        .and_then(Value::as_str)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn results(body: &Value) -> Result<&Vec<Value>> {
    body.get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::decode("list response without a results array"))
}

fn next_cursor(body: &Value) -> Option<String> {
    body.get("next_cursor")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn has_more(body: &Value) -> bool {
    body.get("has_more").and_then(Value::as_bool).unwrap_or(false)
}
