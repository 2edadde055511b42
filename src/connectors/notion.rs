//! Document store connector
//!
//! Records are pages in one database. Properties are written under the
//! configured names; content is a list of heading, divider and paragraph
//! blocks under the page.

use crate::auth::AuthConfig;
use crate::config::PropertyNames;
use crate::connector::DocumentStore;
use crate::decode::{decode_blocks, decode_created_id, PageDecoder};
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use crate::sync::fragment;
use crate::types::{Block, BlockRef, Field, NewRecord, QueryPage};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Default API root
pub const NOTION_API_BASE: &str = "https://api.notion.com/v1/";

/// API version header value
pub const NOTION_VERSION: &str = "2022-06-28";

/// Records and blocks per listing request
const PAGE_SIZE: usize = 100;

/// Longest text a single rich-text segment may carry
const RICH_TEXT_MAX: usize = 2_000;

/// A database in the document store
#[derive(Debug)]
pub struct NotionStore {
    client: HttpClient,
    database_id: String,
    properties: PropertyNames,
    decoder: PageDecoder,
}

impl NotionStore {
    /// Create a connector against the public API
    pub fn new(token: &str, database_id: impl Into<String>, properties: PropertyNames) -> Result<Self> {
        Self::with_base_url(NOTION_API_BASE, token, database_id, properties)
    }

    /// Create a connector against another API root
    pub fn with_base_url(
        base_url: &str,
        token: &str,
        database_id: impl Into<String>,
        properties: PropertyNames,
    ) -> Result<Self> {
        let builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(60))
            // Transport retries only reach reads; writes override this per request
            .max_retries(3)
            .rate_limit(RateLimiterConfig::document_store())
            .header("Notion-Version", NOTION_VERSION);
        let client = HttpClient::with_config(AuthConfig::bearer(token).apply(builder).build())?;
        Ok(Self {
            client,
            database_id: database_id.into(),
            decoder: PageDecoder::new(properties.clone()),
            properties,
        })
    }

    /// Property map for a set of fields
    pub fn encode_fields(&self, fields: &[Field]) -> Value {
        let names = &self.properties;
        let mut properties = Map::new();
        for field in fields {
            let (name, value) = match field {
                Field::Origin(text) => (&names.origin, json!({ "title": rich_text(text) })),
                Field::Title(text) => (&names.title, json!({ "rich_text": rich_text(text) })),
                Field::Summary(text) => (&names.summary, json!({ "rich_text": rich_text(text) })),
                Field::Identifier(text) => {
                    (&names.identifier, json!({ "rich_text": rich_text(text) }))
                }
                Field::Date(date) => (
                    &names.date,
                    json!({ "date": { "start": date.format("%Y-%m-%d").to_string() } }),
                ),
                Field::Url(url) => (&names.url, json!({ "url": url })),
            };
            properties.insert(name.clone(), value);
        }
        Value::Object(properties)
    }

    /// Send a write exactly once; the store may have committed a request
    /// whose response was lost, so writes are never resent.
    async fn write(&self, method: Method, path: &str, body: Value) -> Result<Value> {
        self.client
            .request_json(method, path, RequestConfig::new().json(body).retries(0))
            .await
    }
}

/// Rich text segments for `text`, split to the per-segment limit
pub fn rich_text(text: &str) -> Value {
    let segments: Vec<Value> = fragment(text, RICH_TEXT_MAX)
        .into_iter()
        .map(|content| json!({ "type": "text", "text": { "content": content } }))
        .collect();
    Value::Array(segments)
}

/// Block object for a content block
pub fn encode_block(block: &Block) -> Value {
    match block {
        Block::Heading(text) => json!({
            "object": "block",
            "type": "heading_1",
            "heading_1": { "rich_text": rich_text(text) }
        }),
        Block::Divider => json!({
            "object": "block",
            "type": "divider",
            "divider": {}
        }),
        Block::Paragraph(text) => json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text(text) }
        }),
    }
}

fn encode_blocks(blocks: &[Block]) -> Value {
    Value::Array(blocks.iter().map(encode_block).collect())
}

#[async_trait]
impl DocumentStore for NotionStore {
    async fn query(&self, cursor: Option<&str>) -> Result<QueryPage> {
        let mut body = json!({ "page_size": PAGE_SIZE });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        let path = format!("databases/{}/query", self.database_id);
        let response: Value = self.client.post_json(&path, body).await?;
        self.decoder.decode_query(&response)
    }

    async fn create(&self, record: &NewRecord) -> Result<String> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": self.encode_fields(&record.fields),
            "children": encode_blocks(&record.children),
        });
        let response = self.write(Method::POST, "pages", body).await?;
        decode_created_id(&response)
    }

    async fn update_properties(&self, reference: &str, fields: &[Field]) -> Result<()> {
        let body = json!({ "properties": self.encode_fields(fields) });
        self.write(Method::PATCH, &format!("pages/{reference}"), body)
            .await?;
        Ok(())
    }

    async fn append_children(&self, reference: &str, blocks: &[Block]) -> Result<()> {
        let body = json!({ "children": encode_blocks(blocks) });
        self.write(Method::PATCH, &format!("blocks/{reference}/children"), body)
            .await?;
        Ok(())
    }

    async fn list_children(&self, reference: &str) -> Result<Vec<BlockRef>> {
        let path = format!("blocks/{reference}/children");
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = RequestConfig::new().query("page_size", PAGE_SIZE.to_string());
            if let Some(c) = &cursor {
                request = request.query("start_cursor", c);
            }
            let response: Value = self.client.get_json(&path, request).await?;
            let page = decode_blocks(&response)?;
            blocks.extend(page.blocks);

            match page.next_cursor {
                Some(next) if page.has_more && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        debug!(reference, count = blocks.len(), "Listed child blocks");
        Ok(blocks)
    }

    async fn delete_block(&self, block: &str) -> Result<()> {
        self.client
            .request(
                Method::DELETE,
                &format!("blocks/{block}"),
                RequestConfig::new().retries(0),
            )
            .await?;
        Ok(())
    }
}
