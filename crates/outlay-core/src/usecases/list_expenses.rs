//! List expenses use case

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::{Expense, RecordId};
use crate::ports::IRecordStore;

/// Use case for reading stored expenses
pub struct ListExpensesUseCase {
    record_store: Arc<dyn IRecordStore + Send + Sync>,
}

impl ListExpensesUseCase {
    pub fn new(record_store: Arc<dyn IRecordStore + Send + Sync>) -> Self {
        Self { record_store }
    }

    /// Returns every expense, most recently created first
    pub async fn execute(&self) -> Result<Vec<Expense>> {
        let mut expenses = self
            .record_store
            .list()
            .await
            .context("Failed to list expenses")?;
        expenses.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(expenses)
    }

    /// Looks up a single expense
    pub async fn get(&self, id: &RecordId) -> Result<Option<Expense>> {
        self.record_store
            .get(id)
            .await
            .context("Failed to load expense")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::{Amount, ExpenseDraft};
    use crate::usecases::test_support::InMemoryRecordStore;

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = Arc::new(InMemoryRecordStore::default());
        let base = Utc::now() - Duration::hours(3);

        for (offset, name) in [(0, "first"), (2, "third"), (1, "second")] {
            let created = base + Duration::hours(offset);
            let draft = ExpenseDraft::new(Amount::from_cents(100).unwrap(), "misc", created);
            let expense =
                Expense::create_with_id(RecordId::new(name).unwrap(), draft, created).unwrap();
            store.put(&expense).await.unwrap();
        }

        let usecase = ListExpensesUseCase::new(store);
        let ids: Vec<String> = usecase
            .execute()
            .await
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect();

        assert_eq!(ids, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let usecase = ListExpensesUseCase::new(Arc::new(InMemoryRecordStore::default()));
        let id = RecordId::new("missing").unwrap();
        assert!(usecase.get(&id).await.unwrap().is_none());
    }
}
