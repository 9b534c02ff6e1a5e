//! Remote sync gateway port (driven/secondary port)
//!
//! The remote store is reached through a single idempotent bulk-upsert
//! operation. Any transport (HTTP batch endpoint, message queue, a drop
//! directory) can sit behind it.

use crate::domain::PendingEntry;

/// Port trait for submitting queued records to the remote
///
/// ## Implementation Notes
///
/// - `submit` is all-or-nothing: `Ok(())` means every entry was accepted,
///   any error means the attempt as a whole failed.
/// - Submitting the same entry twice must be harmless (upsert semantics),
///   since a batch is resent after any failure.
/// - Entries arrive oldest first.
#[async_trait::async_trait]
pub trait ISyncGateway: Send + Sync {
    /// Submits a batch of pending entries as one unit
    async fn submit(&self, batch: &[PendingEntry]) -> anyhow::Result<()>;
}
