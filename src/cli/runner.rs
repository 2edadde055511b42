//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{Credentials, PipelineConfig};
use crate::connectors::{build_pipeline, store_from_config};
use crate::engine::{Plan, UnitState};
use crate::sync::{ReconcileReport, StateReconciler};
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command.
    ///
    /// Errors here mean the command could not start; per-item failures are
    /// part of the printed report.
    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.cli.command {
            Commands::Run { max_items } => self.run_pipeline(*max_items).await,
            Commands::Plan { max_items } => self.plan(*max_items).await,
            Commands::Status => self.status().await,
        }
    }

    fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let path = &self.cli.config;
        let config = PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        info!(path = %path.display(), sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    fn load_credentials() -> anyhow::Result<Credentials> {
        Credentials::from_env().context("failed to read credentials from the environment")
    }

    async fn run_pipeline(&self, max_items: Option<usize>) -> anyhow::Result<()> {
        let config = self.load_config()?;
        let credentials = Self::load_credentials()?;
        let mut pipeline = build_pipeline(config, &credentials)
            .context("failed to build pipeline")?
            .with_max_items(max_items);

        let report = pipeline.run().await;
        let mut pretty = report.summary.to_string();
        for outcome in &report.outcomes {
            if let UnitState::Failed { error } = &outcome.state {
                let _ = write!(pretty, "\n  {} failed: {error}", outcome.id);
            }
        }
        self.output(&report, &pretty)
    }

    async fn plan(&self, max_items: Option<usize>) -> anyhow::Result<()> {
        let config = self.load_config()?;
        let credentials = Self::load_credentials()?;
        let pipeline = build_pipeline(config, &credentials)
            .context("failed to build pipeline")?
            .with_max_items(max_items);

        let plan = pipeline.plan().await;
        self.output(&plan, &render_plan(&plan))
    }

    async fn status(&self) -> anyhow::Result<()> {
        let config = self.load_config()?;
        let credentials = Self::load_credentials()?;
        let store = store_from_config(&config, &credentials).context("failed to build store")?;

        let report = StateReconciler::new(store.as_ref()).reconcile().await;
        self.output(&report, &render_status(&report))
    }

    fn output<T: Serialize>(&self, value: &T, pretty: &str) -> anyhow::Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
            OutputFormat::Pretty => println!("{pretty}"),
        }
        Ok(())
    }
}

/// Human-readable work list
pub fn render_plan(plan: &Plan) -> String {
    let mut out = format!(
        "Store holds {} items, {} failing; discovered {} items",
        plan.reconcile.ledger.processed_count(),
        plan.reconcile.ledger.failed_count(),
        plan.discovered
    );
    if !plan.sources_failed.is_empty() {
        let _ = write!(out, "\nSources skipped: {}", plan.sources_failed.join(", "));
    }
    if plan.units.is_empty() {
        out.push_str("\nNothing to do");
    }
    for unit in &plan.units {
        let kind = if unit.is_retry { "retry" } else { "new" };
        let _ = write!(out, "\n  [{kind}] {} {}", unit.item.id, unit.item.title);
    }
    if plan.deferred > 0 {
        let _ = write!(out, "\n{} more deferred to a later run", plan.deferred);
    }
    out
}

/// Human-readable store state
pub fn render_status(report: &ReconcileReport) -> String {
    let ledger = &report.ledger;
    let mut out = format!(
        "Store holds {} items, {} failing ({} pages read)",
        ledger.processed_count(),
        ledger.failed_count(),
        report.pages
    );
    for (id, reference) in ledger.failed() {
        let _ = write!(out, "\n  {id} -> {reference}");
    }
    if !report.complete {
        out.push_str("\nWarning: store state was only partially read");
    }
    if report.schema_suspect {
        out.push_str("\nWarning: store records did not match the configured properties");
    }
    out
}
