//! Delete expense use case
//!
//! Removes an expense locally and drops it from the pending queue. A record
//! deleted before its first sync leaves no trace for the remote: no
//! tombstone is queued.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::{DomainError, RecordId};
use crate::ports::{ILocalWriteSink, IRecordStore};

/// Use case for deleting an expense
pub struct DeleteExpenseUseCase {
    record_store: Arc<dyn IRecordStore + Send + Sync>,
    sync_sink: Arc<dyn ILocalWriteSink + Send + Sync>,
}

impl DeleteExpenseUseCase {
    pub fn new(
        record_store: Arc<dyn IRecordStore + Send + Sync>,
        sync_sink: Arc<dyn ILocalWriteSink + Send + Sync>,
    ) -> Self {
        Self {
            record_store,
            sync_sink,
        }
    }

    /// Deletes the expense identified by `id`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ExpenseNotFound` if no such expense exists, or
    /// a storage/queue error (the expense is put back when the queue cannot
    /// drop it)
    pub async fn execute(&self, id: &RecordId) -> Result<()> {
        let existing = self
            .record_store
            .get(id)
            .await
            .context("Failed to load expense")?
            .ok_or_else(|| DomainError::ExpenseNotFound(id.to_string()))?;

        let removed = self
            .record_store
            .delete(id)
            .await
            .context("Failed to delete expense")?;
        if !removed {
            return Err(DomainError::ExpenseNotFound(id.to_string()).into());
        }

        if let Err(err) = self.sync_sink.discard_local_write(id).await {
            if let Err(rollback) = self.record_store.put(&existing).await {
                warn!(
                    id = %id,
                    error = %rollback,
                    "Failed to restore expense whose queued write could not be dropped"
                );
            }
            return Err(err.context("Failed to drop deleted expense from the sync queue"));
        }

        info!(id = %id, "Expense deleted");
        Ok(())
    }
}
