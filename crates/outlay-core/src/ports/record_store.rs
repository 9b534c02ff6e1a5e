//! Record store port (driven/secondary port)
//!
//! Durable local storage holding the canonical list of expenses. The write
//! use cases are its only callers; the sync engine works from queued
//! payloads instead.

use crate::domain::{Expense, RecordId};

/// Port trait for the local expense store
#[async_trait::async_trait]
pub trait IRecordStore: Send + Sync {
    /// Retrieves an expense by id
    async fn get(&self, id: &RecordId) -> anyhow::Result<Option<Expense>>;

    /// Lists every stored expense (no particular order)
    async fn list(&self) -> anyhow::Result<Vec<Expense>>;

    /// Saves an expense (insert or update)
    async fn put(&self, expense: &Expense) -> anyhow::Result<()>;

    /// Deletes an expense by id
    ///
    /// Returns `false` if no expense with that id existed.
    async fn delete(&self, id: &RecordId) -> anyhow::Result<bool>;
}
