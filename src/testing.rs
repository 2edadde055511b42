//! In-memory fakes for the connector traits

use crate::connector::{Discovery, DocumentStore, Transformer};
use crate::error::{Error, Result};
use crate::sync::{SleepReason, Sleeper};
use crate::types::{
    Block, BlockRef, Field, Item, NewRecord, QueryPage, StoreRecord, TransformOutput,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem::discriminant;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Document Store
// ============================================================================

/// A call made against [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Query { cursor: Option<String> },
    Create { children: usize },
    UpdateProperties { reference: String, fields: Vec<Field> },
    Append { reference: String, blocks: usize },
    ListChildren { reference: String },
    DeleteBlock { block: String },
}

#[derive(Debug, Clone)]
struct MemoryRecord {
    reference: String,
    fields: Vec<Field>,
    blocks: Vec<(String, Block)>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<MemoryRecord>,
    calls: Vec<StoreCall>,
    next_id: usize,
    page_size: usize,
    queries: usize,
    fail_queries_after: Option<usize>,
    malformed_per_page: usize,
    fail_creates: bool,
    fail_appends: bool,
    undeletable: HashSet<String>,
}

impl StoreState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record_mut(&mut self, reference: &str) -> Result<&mut MemoryRecord> {
        self.records
            .iter_mut()
            .find(|r| r.reference == reference)
            .ok_or_else(|| Error::http_status(404, format!("no record {reference}")))
    }

    fn push_blocks(&mut self, reference: &str, blocks: &[Block]) -> Result<()> {
        let ids: Vec<String> = blocks.iter().map(|_| self.next_id("block")).collect();
        let record = self.record_mut(reference)?;
        record
            .blocks
            .extend(ids.into_iter().zip(blocks.iter().cloned()));
        Ok(())
    }
}

/// Paginated in-memory document store with a call log and failure injection
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_page_size(100)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let state = StoreState {
            page_size: page_size.max(1),
            ..StoreState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    /// Add a record with an identifier, summary and paragraph blocks
    pub fn seed(&self, id: &str, summary: &str, paragraphs: &[&str]) -> String {
        let reference = self.seed_raw(Some(id), Some(summary));
        let blocks: Vec<Block> = paragraphs
            .iter()
            .map(|p| Block::Paragraph((*p).to_string()))
            .collect();
        self.lock().push_blocks(&reference, &blocks).unwrap();
        reference
    }

    /// Add a record that may lack the identifier or summary property
    pub fn seed_raw(&self, id: Option<&str>, summary: Option<&str>) -> String {
        let mut state = self.lock();
        let reference = state.next_id("page");
        let mut fields = Vec::new();
        if let Some(id) = id {
            fields.push(Field::Identifier(id.to_string()));
        }
        if let Some(summary) = summary {
            fields.push(Field::Summary(summary.to_string()));
        }
        state.records.push(MemoryRecord {
            reference: reference.clone(),
            fields,
            blocks: Vec::new(),
        });
        reference
    }

    /// Let `n` queries succeed, then fail every following one
    pub fn fail_queries_after(&self, n: usize) {
        self.lock().fail_queries_after = Some(n);
    }

    /// Report `n` undecodable entries on every query page
    pub fn malformed_per_page(&self, n: usize) {
        self.lock().malformed_per_page = n;
    }

    pub fn fail_creates(&self) {
        self.lock().fail_creates = true;
    }

    pub fn fail_appends(&self) {
        self.lock().fail_appends = true;
    }

    pub fn fail_delete_of(&self, block: &str) {
        self.lock().undeletable.insert(block.to_string());
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn blocks(&self, reference: &str) -> Vec<Block> {
        self.find(reference)
            .map(|r| r.blocks.into_iter().map(|(_, b)| b).collect())
            .unwrap_or_default()
    }

    pub fn blocks_ids(&self, reference: &str) -> Vec<String> {
        self.find(reference)
            .map(|r| r.blocks.into_iter().map(|(id, _)| id).collect())
            .unwrap_or_default()
    }

    pub fn fields(&self, reference: &str) -> Vec<Field> {
        self.find(reference).map(|r| r.fields).unwrap_or_default()
    }

    /// Summary of the record carrying identifier `id`
    pub fn summary_of(&self, id: &str) -> Option<String> {
        let state = self.lock();
        let record = state
            .records
            .iter()
            .find(|r| r.fields.contains(&Field::Identifier(id.to_string())))?;
        record.fields.iter().find_map(|f| match f {
            Field::Summary(s) => Some(s.clone()),
            _ => None,
        })
    }

    /// Reference of the record carrying identifier `id`
    pub fn reference_of(&self, id: &str) -> Option<String> {
        self.lock()
            .records
            .iter()
            .find(|r| r.fields.contains(&Field::Identifier(id.to_string())))
            .map(|r| r.reference.clone())
    }

    fn find(&self, reference: &str) -> Option<MemoryRecord> {
        self.lock()
            .records
            .iter()
            .find(|r| r.reference == reference)
            .cloned()
    }
}

fn to_store_record(record: &MemoryRecord) -> StoreRecord {
    let mut out = StoreRecord {
        reference: record.reference.clone(),
        identifier: None,
        status_text: None,
    };
    for field in &record.fields {
        match field {
            Field::Identifier(id) => out.identifier = Some(id.clone()),
            Field::Summary(s) => out.status_text = Some(s.clone()),
            _ => {}
        }
    }
    out
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, cursor: Option<&str>) -> Result<QueryPage> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Query {
            cursor: cursor.map(ToString::to_string),
        });
        if let Some(limit) = state.fail_queries_after {
            if state.queries >= limit {
                return Err(Error::store("store unavailable"));
            }
        }
        state.queries += 1;

        let start: usize = match cursor {
            Some(c) => c.parse().map_err(|_| Error::store("bad cursor"))?,
            None => 0,
        };
        let end = (start + state.page_size).min(state.records.len());
        let records = state.records[start.min(end)..end]
            .iter()
            .map(to_store_record)
            .collect();
        let has_more = end < state.records.len();
        Ok(QueryPage {
            records,
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
            malformed: state.malformed_per_page,
        })
    }

    async fn create(&self, record: &NewRecord) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Create {
            children: record.children.len(),
        });
        if state.fail_creates {
            return Err(Error::store("create rejected"));
        }
        let reference = state.next_id("page");
        state.records.push(MemoryRecord {
            reference: reference.clone(),
            fields: record.fields.clone(),
            blocks: Vec::new(),
        });
        state.push_blocks(&reference, &record.children)?;
        Ok(reference)
    }

    async fn update_properties(&self, reference: &str, fields: &[Field]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::UpdateProperties {
            reference: reference.to_string(),
            fields: fields.to_vec(),
        });
        let record = state.record_mut(reference)?;
        for field in fields {
            match record
                .fields
                .iter_mut()
                .find(|f| discriminant(*f) == discriminant(field))
            {
                Some(existing) => *existing = field.clone(),
                None => record.fields.push(field.clone()),
            }
        }
        Ok(())
    }

    async fn append_children(&self, reference: &str, blocks: &[Block]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Append {
            reference: reference.to_string(),
            blocks: blocks.len(),
        });
        if state.fail_appends {
            return Err(Error::store("append rejected"));
        }
        state.push_blocks(reference, blocks)
    }

    async fn list_children(&self, reference: &str) -> Result<Vec<BlockRef>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::ListChildren {
            reference: reference.to_string(),
        });
        let record = state.record_mut(reference)?;
        Ok(record
            .blocks
            .iter()
            .map(|(id, _)| BlockRef { id: id.clone() })
            .collect())
    }

    async fn delete_block(&self, block: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::DeleteBlock {
            block: block.to_string(),
        });
        if state.undeletable.contains(block) {
            return Err(Error::store("block is locked"));
        }
        for record in &mut state.records {
            record.blocks.retain(|(id, _)| id != block);
        }
        Ok(())
    }
}

// ============================================================================
// Transformer
// ============================================================================

/// One scripted transformer response
#[derive(Debug, Clone)]
pub enum Step {
    Ok(TransformOutput),
    RateLimit,
    Fail(String),
}

impl Step {
    pub fn ok(summary: &str, content: &str) -> Self {
        Self::Ok(TransformOutput {
            summary: summary.to_string(),
            content: content.to_string(),
        })
    }
}

/// Replays scripted steps in order, per item when a script is registered
/// for it and from the shared queue otherwise
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransformer {
    shared: Arc<Mutex<VecDeque<Step>>>,
    per_item: Arc<Mutex<HashMap<String, VecDeque<Step>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransformer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(steps.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_item(self, id: &str, steps: Vec<Step>) -> Self {
        self.per_item
            .lock()
            .unwrap()
            .insert(id.to_string(), steps.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn called_ids(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transformer for ScriptedTransformer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn transform(&self, item: &Item) -> Result<TransformOutput> {
        self.calls.lock().unwrap().push(item.id.clone());
        let step = {
            let mut per_item = self.per_item.lock().unwrap();
            match per_item.get_mut(&item.id) {
                Some(queue) => queue.pop_front(),
                None => self.shared.lock().unwrap().pop_front(),
            }
        };
        match step {
            Some(Step::Ok(output)) => Ok(output),
            Some(Step::RateLimit) => Err(Error::http_status(
                429,
                r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
            )),
            Some(Step::Fail(message)) => Err(Error::transform(message)),
            None => Err(Error::transform("script exhausted")),
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Returns fixed items per source
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    items: HashMap<String, Vec<Item>>,
    failing: HashSet<String>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, handle: &str, items: Vec<Item>) -> Self {
        self.items.insert(handle.to_string(), items);
        self
    }

    #[must_use]
    pub fn failing(mut self, handle: &str) -> Self {
        self.failing.insert(handle.to_string());
        self
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn list_recent(&self, source: &str, limit: usize) -> Result<Vec<Item>> {
        if self.failing.contains(source) {
            return Err(Error::discovery(source, "connection refused"));
        }
        Ok(self
            .items
            .get(source)
            .map(|items| items.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// Sleeper
// ============================================================================

/// Records sleeps instead of waiting
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<(SleepReason, Duration)>>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<(SleepReason, Duration)> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn durations(&self, reason: SleepReason) -> Vec<Duration> {
        self.recorded()
            .into_iter()
            .filter(|(r, _)| *r == reason)
            .map(|(_, d)| d)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, reason: SleepReason, duration: Duration) {
        self.sleeps.lock().unwrap().push((reason, duration));
    }
}

pub fn item(id: &str) -> Item {
    Item::new(id, format!("Video {id}"), "Test Channel", "2024-05-01T12:00:00Z")
}
