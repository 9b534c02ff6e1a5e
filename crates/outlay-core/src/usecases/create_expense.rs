//! Create expense use case
//!
//! Validates a draft, stores the new expense locally and hands its payload
//! to the sync engine. A write that cannot be queued is rolled back so the
//! caller never sees a success that will not reach the remote.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{Expense, ExpenseDraft};
use crate::ports::{ILocalWriteSink, IRecordStore};

/// Use case for recording a new expense
pub struct CreateExpenseUseCase {
    record_store: Arc<dyn IRecordStore + Send + Sync>,
    sync_sink: Arc<dyn ILocalWriteSink + Send + Sync>,
}

impl CreateExpenseUseCase {
    /// Creates a new CreateExpenseUseCase with the required dependencies
    ///
    /// # Arguments
    ///
    /// * `record_store` - Local expense storage
    /// * `sync_sink` - Receives the payload of every successful write
    pub fn new(
        record_store: Arc<dyn IRecordStore + Send + Sync>,
        sync_sink: Arc<dyn ILocalWriteSink + Send + Sync>,
    ) -> Self {
        Self {
            record_store,
            sync_sink,
        }
    }

    /// Creates, stores and queues an expense
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the expense cannot be stored,
    /// or it cannot be queued for sync (in which case it is removed again)
    pub async fn execute(&self, draft: ExpenseDraft) -> Result<Expense> {
        let expense = Expense::create(draft, Utc::now())?;
        let payload = expense.to_payload()?;

        self.record_store
            .put(&expense)
            .await
            .context("Failed to save expense")?;

        if let Err(err) = self
            .sync_sink
            .notify_local_write(expense.id(), payload)
            .await
        {
            if let Err(rollback) = self.record_store.delete(expense.id()).await {
                warn!(
                    id = %expense.id(),
                    error = %rollback,
                    "Failed to roll back expense that could not be queued"
                );
            }
            return Err(err.context("Failed to queue expense for sync"));
        }

        info!(id = %expense.id(), amount = %expense.amount(), "Expense created");
        Ok(expense)
    }
}
