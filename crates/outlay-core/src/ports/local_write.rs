//! Local write sink port (driving side of the sync engine)
//!
//! Write use cases hand every successful local write to this port. It is
//! the narrow `enqueue(record_id, payload)` contract through which records
//! reach the pending queue; nothing else writes queue storage.

use crate::domain::RecordId;

/// Port trait for handing local writes to the sync engine
#[async_trait::async_trait]
pub trait ILocalWriteSink: Send + Sync {
    /// Queues the latest payload of a record for the remote
    ///
    /// Must not block on network I/O. An error means the write could not be
    /// queued and must not be reported to the user as successful.
    async fn notify_local_write(&self, record_id: &RecordId, payload: Vec<u8>)
        -> anyhow::Result<()>;

    /// Drops a queued record that was deleted locally before reaching the remote
    ///
    /// Records that are not queued are ignored. No tombstone is produced.
    async fn discard_local_write(&self, record_id: &RecordId) -> anyhow::Result<()>;
}
