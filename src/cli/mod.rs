//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Reconcile, discover, transform and persist
//! - `plan` - Print the ordered work list without doing it
//! - `status` - Print processed and failing items from the store

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{render_plan, render_status, Runner};
