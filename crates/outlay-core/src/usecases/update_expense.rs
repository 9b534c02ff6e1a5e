//! Update expense use case
//!
//! Merges a partial update into a stored expense, re-validates it and queues
//! the new payload. Repeated edits before a sync collapse into one queued
//! write carrying the latest state.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{DomainError, Expense, ExpensePatch, RecordId};
use crate::ports::{ILocalWriteSink, IRecordStore};

/// Use case for editing an existing expense
pub struct UpdateExpenseUseCase {
    record_store: Arc<dyn IRecordStore + Send + Sync>,
    sync_sink: Arc<dyn ILocalWriteSink + Send + Sync>,
}

impl UpdateExpenseUseCase {
    /// Creates a new UpdateExpenseUseCase with the required dependencies
    pub fn new(
        record_store: Arc<dyn IRecordStore + Send + Sync>,
        sync_sink: Arc<dyn ILocalWriteSink + Send + Sync>,
    ) -> Self {
        Self {
            record_store,
            sync_sink,
        }
    }

    /// Applies `patch` to the expense identified by `id`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ExpenseNotFound` if no such expense exists,
    /// `DomainError::ValidationFailed` if the merged expense is invalid,
    /// or a storage/queue error (the previous version is restored when
    /// queueing fails)
    pub async fn execute(&self, id: &RecordId, patch: ExpensePatch) -> Result<Expense> {
        let previous = self
            .record_store
            .get(id)
            .await
            .context("Failed to load expense")?
            .ok_or_else(|| DomainError::ExpenseNotFound(id.to_string()))?;

        let mut expense = previous.clone();
        expense.apply(patch, Utc::now())?;
        let payload = expense.to_payload()?;

        self.record_store
            .put(&expense)
            .await
            .context("Failed to save expense")?;

        if let Err(err) = self.sync_sink.notify_local_write(id, payload).await {
            if let Err(rollback) = self.record_store.put(&previous).await {
                warn!(
                    id = %id,
                    error = %rollback,
                    "Failed to restore expense that could not be queued"
                );
            }
            return Err(err.context("Failed to queue expense for sync"));
        }

        info!(id = %id, "Expense updated");
        Ok(expense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, ExpenseDraft};
    use crate::usecases::test_support::{InMemoryRecordStore, RecordingSink};

    async fn seeded_store() -> (Arc<InMemoryRecordStore>, Expense) {
        let store = Arc::new(InMemoryRecordStore::default());
        let draft = ExpenseDraft::new(Amount::from_cents(1000).unwrap(), "food", Utc::now())
            .with_note("coffee");
        let expense = Expense::create(draft, Utc::now()).unwrap();
        store.put(&expense).await.unwrap();
        (store, expense)
    }

    #[tokio::test]
    async fn test_update_merges_and_queues() {
        let (store, original) = seeded_store().await;
        let sink = Arc::new(RecordingSink::default());
        let usecase = UpdateExpenseUseCase::new(store.clone(), sink.clone());

        let patch = ExpensePatch {
            amount: Some(Amount::from_cents(1500).unwrap()),
            ..Default::default()
        };
        let updated = usecase.execute(original.id(), patch).await.unwrap();

        assert_eq!(updated.amount().cents(), 1500);
        assert_eq!(updated.note(), Some("coffee"));
        assert_eq!(updated.created_at(), original.created_at());

        let stored = store.get(original.id()).await.unwrap().unwrap();
        assert_eq!(stored, updated);

        let writes = sink.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, updated.to_payload().unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_expense() {
        let store = Arc::new(InMemoryRecordStore::default());
        let sink = Arc::new(RecordingSink::default());
        let usecase = UpdateExpenseUseCase::new(store, sink);

        let id = RecordId::new("nope").unwrap();
        let err = usecase
            .execute(&id, ExpensePatch::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Expense with id nope not found");
    }

    #[tokio::test]
    async fn test_update_restores_previous_when_queue_fails() {
        let (store, original) = seeded_store().await;
        let sink = Arc::new(RecordingSink::failing());
        let usecase = UpdateExpenseUseCase::new(store.clone(), sink);

        let patch = ExpensePatch {
            category_id: Some("rent".to_string()),
            ..Default::default()
        };
        assert!(usecase.execute(original.id(), patch).await.is_err());

        let stored = store.get(original.id()).await.unwrap().unwrap();
        assert_eq!(stored, original);
    }
}
