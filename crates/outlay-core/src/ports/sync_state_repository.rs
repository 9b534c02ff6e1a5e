//! Sync state repository port (driven/secondary port)
//!
//! This module defines the interface for persisting the two documents the
//! sync engine owns: the pending queue and the sync status.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem, etc.) and are classified by the caller.
//! - The queue is changed with a read-modify-write that the adapter runs
//!   under its own exclusive write lock. Several processes may share one
//!   store, so a mutation always starts from the stored queue rather than
//!   from a copy held in memory.
//! - A document that was never written loads as empty (queue) or `None`
//!   (status).

use crate::domain::{PendingEntry, SyncStatus};

// ============================================================================
// ISyncStateRepository trait
// ============================================================================

/// Port trait for the sync engine's persisted state
///
/// ## Implementation Notes
///
/// - `modify_pending_queue` must read, edit and write the queue as one
///   atomic step with respect to every other writer of the same store,
///   including writers in other processes. A concurrent `load_pending_queue`
///   returns either the old or the new queue, never a mix.
/// - When the edit returns `false` nothing is written.
/// - Entry order is significant and must be preserved.
/// - Payload bytes must round-trip exactly.
#[async_trait::async_trait]
pub trait ISyncStateRepository: Send + Sync {
    /// Loads the last-written pending queue, oldest entry first
    ///
    /// Returns an empty vector if no queue was ever saved.
    async fn load_pending_queue(&self) -> anyhow::Result<Vec<PendingEntry>>;

    /// Applies `edit` to the stored pending queue and returns the result
    ///
    /// `edit` returns whether it changed the queue. If the write fails the
    /// stored queue is left unchanged.
    async fn modify_pending_queue(
        &self,
        edit: &mut (dyn for<'v> FnMut(&'v mut Vec<PendingEntry>) -> bool + Send),
    ) -> anyhow::Result<Vec<PendingEntry>>;

    /// Loads the last-written sync status, if any
    async fn load_sync_status(&self) -> anyhow::Result<Option<SyncStatus>>;

    /// Replaces the stored sync status
    async fn save_sync_status(&self, status: &SyncStatus) -> anyhow::Result<()>;
}
