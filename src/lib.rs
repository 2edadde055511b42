// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Ingest Relay
//!
//! An unattended ingestion pipeline: discover items per source, transform
//! each into a summary and full content, and persist the result into a
//! paginated rich-document store, idempotently across runs.
//!
//! ## Features
//!
//! - **Store-backed state**: processed and failed items are reconstructed
//!   from the destination store every run; there is no local state file
//! - **Retries first**: records that read as failed are re-attempted before
//!   new items, and overwritten in place
//! - **Bounded rate-limit retry**: exponential backoff with jitter, then a
//!   degraded artifact or a skip
//! - **Chunked writes**: long content is fragmented and written in batches
//!   that respect the store's per-request limits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ingest_relay::{connectors::build_pipeline, Credentials, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_file("pipeline.yaml")?;
//!     let credentials = Credentials::from_env()?;
//!
//!     let mut pipeline = build_pipeline(config, &credentials)?;
//!     let report = pipeline.run().await;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Pipeline                             │
//! │  reconcile() → Ledger   plan() → WorkUnits   run() → RunReport  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────┬──────────────┬───┴──────────┬─────────────┬─────────┐
//! │ Reconcile │   Schedule   │ Transform    │  Persist    │  HTTP   │
//! ├───────────┼──────────────┼──────────────┼─────────────┼─────────┤
//! │ Paginate  │ Retries first│ Throttle     │ Fragment    │ Retry   │
//! │ Decode    │ Dedup        │ Backoff      │ Batch       │ Rate    │
//! │ status    │ Per-run cap  │ Degrade      │ Overwrite   │ limit   │
//! └───────────┴──────────────┴──────────────┴─────────────┴─────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Items, artifacts and store records
pub mod types;

/// Pipeline configuration and credentials
pub mod config;

/// Credential placement for connector clients
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Discovery, transformation and store traits
pub mod connector;

/// Reconcile, schedule, retry and persist
pub mod sync;

/// Feed and store response decoders
pub mod decode;

/// Pipeline orchestration
pub mod engine;

/// Built-in connectors
pub mod connectors;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{Credentials, PipelineConfig};
pub use engine::{Pipeline, RunReport};
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
