//! Persistence Writer
//!
//! Writes one artifact to the store as a heading, a divider and the content
//! fragments in order. New items become new records; retries overwrite the
//! existing record in place.
//!
//! Any write that needs more than one call first leaves a failure marker in
//! the summary and only writes the real summary once every block is in
//! place, so a crash mid-write reads back as failed on the next run.

use super::fragment::{batch, fragment, truncate_summary};
use super::sleep::{SleepReason, Sleeper};
use crate::config::PipelineConfig;
use crate::connector::DocumentStore;
use crate::error::Result;
use crate::types::{Artifact, ArtifactStatus, Block, Field, Item, NewRecord, WorkUnit};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Summary written while a multi-call write is in flight
pub const PENDING_SUMMARY: &str = "Error: write incomplete, will retry on next run.";

/// What the writer did with an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// The record now holds the artifact
    Committed {
        /// Store reference of the record
        reference: String,
        /// Whether a new record was created
        created: bool,
        /// Child blocks written, including the heading and divider
        blocks_written: usize,
    },
    /// Rate-limited artifacts are not written
    SkippedRateLimit,
}

impl PersistOutcome {
    /// Whether the artifact was committed
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Commits artifacts to a [`DocumentStore`]
pub struct PersistenceWriter<'a> {
    store: &'a dyn DocumentStore,
    sleeper: &'a dyn Sleeper,
    config: &'a PipelineConfig,
    run_date: NaiveDate,
}

impl<'a> PersistenceWriter<'a> {
    /// Create a writer; `run_date` stands in for unparseable publish dates
    pub fn new(
        store: &'a dyn DocumentStore,
        sleeper: &'a dyn Sleeper,
        config: &'a PipelineConfig,
        run_date: NaiveDate,
    ) -> Self {
        Self {
            store,
            sleeper,
            config,
            run_date,
        }
    }

    /// Commit `artifact` for `unit`.
    ///
    /// Store errors propagate; the caller records the unit as failed and the
    /// next run picks it up again.
    pub async fn persist(&self, unit: &WorkUnit, artifact: &Artifact) -> Result<PersistOutcome> {
        if artifact.status == ArtifactStatus::RateLimited {
            info!(id = %unit.id(), "Not persisting rate-limited result");
            return Ok(PersistOutcome::SkippedRateLimit);
        }

        let layout = &self.config.store;
        let summary = truncate_summary(&artifact.summary, layout.summary_cap);
        let paragraphs: Vec<Block> = fragment(&artifact.content, layout.fragment_max)
            .into_iter()
            .map(Block::Paragraph)
            .collect();
        let blocks = batch(
            paragraphs,
            layout.first_batch_cap,
            layout.subsequent_batch_cap,
        );
        let blocks_written = blocks.len() + crate::config::LEADING_BLOCKS;

        let mut first = vec![Block::Heading(layout.heading.clone()), Block::Divider];
        first.extend(blocks.first);

        match unit.store_reference.as_deref() {
            Some(reference) => {
                self.overwrite(reference, first, blocks.rest, summary)
                    .await?;
                info!(id = %unit.id(), reference, blocks = blocks_written, "Updated record");
                Ok(PersistOutcome::Committed {
                    reference: reference.to_string(),
                    created: false,
                    blocks_written,
                })
            }
            None => {
                let reference = self.create(&unit.item, first, blocks.rest, summary).await?;
                info!(id = %unit.id(), reference = %reference, blocks = blocks_written, "Created record");
                Ok(PersistOutcome::Committed {
                    reference,
                    created: true,
                    blocks_written,
                })
            }
        }
    }

    async fn create(
        &self,
        item: &Item,
        first: Vec<Block>,
        rest: Vec<Vec<Block>>,
        summary: String,
    ) -> Result<String> {
        let multi_call = !rest.is_empty();
        let initial_summary = if multi_call {
            PENDING_SUMMARY.to_string()
        } else {
            summary.clone()
        };
        let record = NewRecord {
            fields: self.fields(item, initial_summary),
            children: first,
        };
        let reference = self.store.create(&record).await?;

        if multi_call {
            self.append_all(&reference, rest).await?;
            self.store
                .update_properties(&reference, &[Field::Summary(summary)])
                .await?;
        }
        Ok(reference)
    }

    async fn overwrite(
        &self,
        reference: &str,
        first: Vec<Block>,
        rest: Vec<Vec<Block>>,
        summary: String,
    ) -> Result<()> {
        self.store
            .update_properties(reference, &[Field::Summary(PENDING_SUMMARY.to_string())])
            .await?;

        let existing = self.store.list_children(reference).await?;
        debug!(reference, blocks = existing.len(), "Clearing previous content");
        for block in existing {
            if let Err(e) = self.store.delete_block(&block.id).await {
                warn!(reference, block = %block.id, "Failed to delete old block: {e}");
            }
        }

        let mut batches = Vec::with_capacity(rest.len() + 1);
        batches.push(first);
        batches.extend(rest);
        self.append_all(reference, batches).await?;

        self.store
            .update_properties(reference, &[Field::Summary(summary)])
            .await
    }

    async fn append_all(&self, reference: &str, batches: Vec<Vec<Block>>) -> Result<()> {
        let pause = self.config.store.append_pause();
        for blocks in batches {
            self.sleeper.sleep(SleepReason::AppendPause, pause).await;
            self.store.append_children(reference, &blocks).await?;
        }
        Ok(())
    }

    fn fields(&self, item: &Item, summary: String) -> Vec<Field> {
        let url = item
            .url
            .clone()
            .unwrap_or_else(|| self.config.item_url(&item.id));
        vec![
            Field::Origin(item.origin.clone()),
            Field::Title(item.title.clone()),
            Field::Date(item.published_date(self.run_date)),
            Field::Summary(summary),
            Field::Identifier(item.id.clone()),
            Field::Url(url),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, RecordingSleeper, StoreCall};
    use pretty_assertions::assert_eq;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn item(id: &str) -> Item {
        Item::new(id, "A title", "A channel", "2024-03-05T10:00:00Z")
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn test_small_artifact_single_create() {
        let store = MemoryStore::new();
        let sleeper = RecordingSleeper::default();
        let config = config();
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        let artifact = Artifact::success("short", "x".repeat(5000));
        let outcome = writer.persist(&WorkUnit::new(item("V1")), &artifact).await.unwrap();

        let PersistOutcome::Committed { reference, created, blocks_written } = outcome else {
            panic!("expected commit");
        };
        assert!(created);
        assert_eq!(blocks_written, 5);
        assert_eq!(store.calls(), vec![StoreCall::Create { children: 5 }]);

        let blocks = store.blocks(&reference);
        assert_eq!(blocks[0], Block::Heading("Full Transcript".to_string()));
        assert_eq!(blocks[1], Block::Divider);
        let sizes: Vec<usize> = blocks[2..]
            .iter()
            .map(|b| match b {
                Block::Paragraph(text) => text.chars().count(),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(sizes, vec![2000, 2000, 1000]);

        let fields = store.fields(&reference);
        assert!(fields.contains(&Field::Summary("short".to_string())));
        assert!(fields.contains(&Field::Identifier("V1".to_string())));
        assert!(fields.contains(&Field::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())));
        assert!(fields.contains(&Field::Url(
            "https://www.youtube.com/watch?v=V1".to_string()
        )));
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_large_artifact_appends_in_batches() {
        let store = MemoryStore::new();
        let sleeper = RecordingSleeper::default();
        let mut config = config();
        config.store.fragment_max = 10;
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        // 250 fragments: 98 inline, then 100 and 52
        let artifact = Artifact::success("done", "y".repeat(2_500));
        let outcome = writer.persist(&WorkUnit::new(item("big")), &artifact).await.unwrap();
        let PersistOutcome::Committed { reference, blocks_written, .. } = outcome else {
            panic!("expected commit");
        };
        assert_eq!(blocks_written, 252);

        assert_eq!(
            store.calls(),
            vec![
                StoreCall::Create { children: 100 },
                StoreCall::Append { reference: reference.clone(), blocks: 100 },
                StoreCall::Append { reference: reference.clone(), blocks: 52 },
                StoreCall::UpdateProperties {
                    reference: reference.clone(),
                    fields: vec![Field::Summary("done".to_string())],
                },
            ]
        );
        assert_eq!(store.blocks(&reference).len(), 252);
        assert_eq!(sleeper.durations(SleepReason::AppendPause).len(), 2);
    }

    #[tokio::test]
    async fn test_crash_mid_append_reads_back_as_failed() {
        let store = MemoryStore::new();
        store.fail_appends();
        let sleeper = RecordingSleeper::default();
        let mut config = config();
        config.store.fragment_max = 1;
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        let artifact = Artifact::success("done", "z".repeat(150));
        let result = writer.persist(&WorkUnit::new(item("half")), &artifact).await;
        assert!(result.is_err());

        let status = store.summary_of("half").unwrap();
        assert!(ArtifactStatus::decode(&status).is_failure());
    }

    #[tokio::test]
    async fn test_retry_overwrites_in_place() {
        let store = MemoryStore::new();
        let reference = store.seed("V2", "Transcription failed.", &["Error: boom", "old"]);
        store.fail_delete_of(&store.blocks_ids(&reference)[0]);
        let sleeper = RecordingSleeper::default();
        let config = config();
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        let unit = WorkUnit::retry(Item::placeholder("V2"), reference.clone());
        let outcome = writer
            .persist(&unit, &Artifact::success("Fresh summary", "new content"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PersistOutcome::Committed {
                reference: reference.clone(),
                created: false,
                blocks_written: 3,
            }
        );
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.summary_of("V2").as_deref(), Some("Fresh summary"));

        // placeholder metadata never reaches the store
        assert!(!store.fields(&reference).contains(&Field::Title("Unknown title".to_string())));

        let calls = store.calls();
        assert!(matches!(calls[0], StoreCall::UpdateProperties { .. }));
        assert_eq!(calls[1], StoreCall::ListChildren { reference: reference.clone() });
        assert!(matches!(calls.last(), Some(StoreCall::UpdateProperties { .. })));

        // the undeletable old block survives ahead of the new content
        let blocks = store.blocks(&reference);
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1], Block::Heading("Full Transcript".to_string()));
        assert_eq!(blocks[3], Block::Paragraph("new content".to_string()));
    }

    #[tokio::test]
    async fn test_rate_limited_artifact_is_never_written() {
        let store = MemoryStore::new();
        let sleeper = RecordingSleeper::default();
        let config = config();
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        let outcome = writer
            .persist(&WorkUnit::new(item("R")), &Artifact::rate_limited("quota"))
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::SkippedRateLimit);
        assert!(!outcome.is_committed());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_artifact_is_recorded() {
        let store = MemoryStore::new();
        let sleeper = RecordingSleeper::default();
        let config = config();
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        let mut unlisted = item("F");
        unlisted.published = "not a date".to_string();
        let outcome = writer
            .persist(&WorkUnit::new(unlisted), &Artifact::failed("private video"))
            .await
            .unwrap();
        let PersistOutcome::Committed { reference, .. } = outcome else {
            panic!("expected commit");
        };
        assert_eq!(store.summary_of("F").as_deref(), Some("Transcription failed."));
        assert!(store.fields(&reference).contains(&Field::Date(run_date())));
        assert_eq!(
            store.blocks(&reference)[2],
            Block::Paragraph("Error: private video".to_string())
        );
    }

    #[tokio::test]
    async fn test_summary_is_truncated() {
        let store = MemoryStore::new();
        let sleeper = RecordingSleeper::default();
        let mut config = config();
        config.store.summary_cap = 10;
        let writer = PersistenceWriter::new(&store, &sleeper, &config, run_date());

        writer
            .persist(&WorkUnit::new(item("T")), &Artifact::success("a".repeat(50), ""))
            .await
            .unwrap();
        assert_eq!(store.summary_of("T").as_deref(), Some("aaaaaaa..."));
    }
}
