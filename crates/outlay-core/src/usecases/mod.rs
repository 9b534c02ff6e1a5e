//! Use cases (interactors) for Outlay
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`CreateExpenseUseCase`] - Validate, store and queue a new expense
//! - [`UpdateExpenseUseCase`] - Merge a patch into a stored expense and queue it
//! - [`ListExpensesUseCase`] - Newest-first listing and lookup by id
//! - [`DeleteExpenseUseCase`] - Remove an expense and drop it from the queue

pub mod create_expense;
pub mod delete_expense;
pub mod list_expenses;
pub mod update_expense;

pub use create_expense::CreateExpenseUseCase;
pub use delete_expense::DeleteExpenseUseCase;
pub use list_expenses::ListExpensesUseCase;
pub use update_expense::UpdateExpenseUseCase;

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::domain::{Expense, RecordId};
    use crate::ports::{ILocalWriteSink, IRecordStore};

    /// HashMap-backed record store
    #[derive(Default)]
    pub struct InMemoryRecordStore {
        pub records: Mutex<HashMap<RecordId, Expense>>,
    }

    #[async_trait::async_trait]
    impl IRecordStore for InMemoryRecordStore {
        async fn get(&self, id: &RecordId) -> anyhow::Result<Option<Expense>> {
            Ok(self.records.lock().unwrap().get(id).cloned())
        }

        async fn list(&self) -> anyhow::Result<Vec<Expense>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }

        async fn put(&self, expense: &Expense) -> anyhow::Result<()> {
            self.records
                .lock()
                .unwrap()
                .insert(expense.id().clone(), expense.clone());
            Ok(())
        }

        async fn delete(&self, id: &RecordId) -> anyhow::Result<bool> {
            Ok(self.records.lock().unwrap().remove(id).is_some())
        }
    }

    /// Records every call; can be switched to fail
    #[derive(Default)]
    pub struct RecordingSink {
        pub writes: Mutex<Vec<(RecordId, Vec<u8>)>>,
        pub discards: Mutex<Vec<RecordId>>,
        pub fail: AtomicBool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            let sink = Self::default();
            sink.fail.store(true, Ordering::SeqCst);
            sink
        }
    }

    #[async_trait::async_trait]
    impl ILocalWriteSink for RecordingSink {
        async fn notify_local_write(
            &self,
            record_id: &RecordId,
            payload: Vec<u8>,
        ) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.writes
                .lock()
                .unwrap()
                .push((record_id.clone(), payload));
            Ok(())
        }

        async fn discard_local_write(&self, record_id: &RecordId) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.discards.lock().unwrap().push(record_id.clone());
            Ok(())
        }
    }
}
