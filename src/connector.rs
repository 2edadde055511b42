//! Connector traits
//!
//! The pipeline talks to three external collaborators. Each is an async
//! trait so implementations can be swapped by configuration (search vs feed
//! discovery, URL vs upload transformation) and faked in tests.

use crate::error::Result;
use crate::types::{Block, BlockRef, Field, Item, NewRecord, QueryPage, TransformOutput};
use async_trait::async_trait;

// ============================================================================
// Discovery
// ============================================================================

/// Enumerates candidate items for a source handle
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Short connector name for logs
    fn name(&self) -> &'static str;

    /// Newest items for a source, at most `limit`.
    ///
    /// An unknown source yields an empty list rather than an error.
    async fn list_recent(&self, source: &str, limit: usize) -> Result<Vec<Item>>;
}

// ============================================================================
// Transformation
// ============================================================================

/// Turns an item reference into free-text artifacts
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Short connector name for logs
    fn name(&self) -> &'static str;

    /// Transform one item. Throttling must be reported through an error for
    /// which [`crate::Error::is_rate_limited`] returns true.
    async fn transform(&self, item: &Item) -> Result<TransformOutput>;
}

// ============================================================================
// Document Store
// ============================================================================

/// A paginated, append-only rich-document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One page of records, starting at `cursor` (or the beginning)
    async fn query(&self, cursor: Option<&str>) -> Result<QueryPage>;

    /// Create a record with inline children, returning its reference
    async fn create(&self, record: &NewRecord) -> Result<String>;

    /// Overwrite properties on an existing record
    async fn update_properties(&self, reference: &str, fields: &[Field]) -> Result<()>;

    /// Append child blocks to a record
    async fn append_children(&self, reference: &str, blocks: &[Block]) -> Result<()>;

    /// All child blocks of a record, in order
    async fn list_children(&self, reference: &str) -> Result<Vec<BlockRef>>;

    /// Delete one block
    async fn delete_block(&self, block: &str) -> Result<()>;
}
