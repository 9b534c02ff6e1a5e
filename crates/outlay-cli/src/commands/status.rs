//! Status command - Display synchronization status
//!
//! Provides the `outlay status` CLI command which:
//! 1. Shows the sync state, last successful sync and last error
//! 2. Shows how many local changes are waiting to be sent
//! 3. Lists the pending queue when `--pending` is given

use anyhow::Result;
use clap::Args;
use tracing::info;

use outlay_core::domain::{SyncState, SyncStatus};

use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// List the queued changes
    #[arg(long)]
    pub pending: bool,
}

impl StatusCommand {
    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let ctx = AppContext::open(global).await?;

        let status = ctx.coordinator.status();
        let entries = if self.pending {
            ctx.coordinator.pending_entries().await
        } else {
            Ok(Vec::new())
        };
        let drop_dir = ctx.config.remote.drop_dir.clone();
        ctx.close().await;
        let entries = entries?;

        info!(state = %status.state(), pending = status.pending_count(), "Showing status");

        if matches!(format, OutputFormat::Json) {
            let mut json = serde_json::json!({
                "state": status.state().name(),
                "online": status.is_online(),
                "last_sync_at": status.last_sync_at().map(|t| t.to_rfc3339()),
                "pending_count": status.pending_count(),
                "last_error": status.last_error(),
                "remote": drop_dir.display().to_string(),
            });
            if self.pending {
                json["pending"] = entries
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "record_id": e.record_id.to_string(),
                            "enqueued_at": e.enqueued_at.to_rfc3339(),
                            "bytes": e.payload.len(),
                        })
                    })
                    .collect();
            }
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("Outlay Status - {}", describe(&status)));
        formatter.info("");
        match status.last_sync_at() {
            Some(time) => formatter.info(&format!(
                "Last sync: {}",
                time.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            None => formatter.info("Last sync: Never"),
        }
        formatter.info(&format!("Pending changes: {}", status.pending_count()));
        formatter.info(&format!("Remote: {}", drop_dir.display()));

        if let Some(error) = status.last_error() {
            formatter.info("");
            formatter.error(&format!("Last sync failed: {}", error));
        }

        if self.pending && !entries.is_empty() {
            formatter.info("");
            formatter.info("Pending changes:");
            for entry in &entries {
                formatter.info(&format!(
                    "  {}  queued {}  ({} bytes)",
                    entry.record_id,
                    entry.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.payload.len()
                ));
            }
        }

        Ok(())
    }
}

/// Short human label for a status
fn describe(status: &SyncStatus) -> &'static str {
    match status.state() {
        SyncState::Offline => "offline",
        SyncState::Synced => "all changes synced",
        SyncState::Pending => "changes waiting to sync",
        SyncState::Syncing => "syncing",
        SyncState::Error => "last sync failed",
    }
}
