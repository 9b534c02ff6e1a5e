//! Sync command - Send pending changes to the remote
//!
//! Provides the `outlay sync` CLI command which:
//! 1. Loads configuration and opens the database
//! 2. Probes connectivity (skipped with `--offline`)
//! 3. Submits the pending queue as one batch and reports the outcome

use anyhow::Result;
use clap::Args;
use tracing::info;

use outlay_sync::SyncError;

use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Show what would be sent without contacting the remote
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncCommand {
    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let ctx = AppContext::open(global).await?;

        if self.dry_run {
            let entries = ctx.coordinator.pending_entries().await;
            ctx.close().await;
            let entries = entries?;
            match format {
                OutputFormat::Json => formatter.print_json(&serde_json::json!({
                    "dry_run": true,
                    "would_send": entries
                        .iter()
                        .map(|e| e.record_id.to_string())
                        .collect::<Vec<_>>(),
                })),
                OutputFormat::Human => {
                    formatter.info("Dry run mode - nothing will be sent");
                    for entry in &entries {
                        formatter.info(&format!("  would send {}", entry.record_id));
                    }
                    formatter.success(&format!("{} change(s) pending", entries.len()));
                }
            }
            return Ok(());
        }

        info!(pending = ctx.coordinator.pending_count(), "Starting sync");
        let result = ctx.coordinator.run_sync().await;
        let status = ctx.coordinator.status();
        ctx.close().await;

        match result {
            Ok(report) => match format {
                OutputFormat::Json => formatter.print_json(&serde_json::json!({
                    "success": true,
                    "records_sent": report.records_sent,
                    "synced_at": report.synced_at.to_rfc3339(),
                    "duration_ms": report.duration_ms,
                    "pending": status.pending_count(),
                })),
                OutputFormat::Human => {
                    formatter.success("Sync completed");
                    formatter.info(&format!("Records sent: {}", report.records_sent));
                    formatter.info(&format!("Duration: {}ms", report.duration_ms));
                    if status.pending_count() > 0 {
                        formatter.info(&format!(
                            "{} change(s) arrived during the sync and are still pending",
                            status.pending_count()
                        ));
                    }
                }
            },
            Err(SyncError::Offline) => {
                formatter.warn(&format!(
                    "Offline: {} change(s) kept for the next sync",
                    status.pending_count()
                ));
            }
            Err(SyncError::AlreadyInProgress) => {
                formatter.warn("Another sync is already running");
            }
            Err(err) => {
                formatter.error(&format!("Sync failed: {}", err));
                if err.is_retryable() {
                    formatter.info("Pending changes were kept; run 'outlay sync' again to retry");
                }
                std::process::exit(1);
            }
        }

        Ok(())
    }
}
