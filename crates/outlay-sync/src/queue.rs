//! Persisted pending queue
//!
//! The [`PendingQueue`] is the outbox of local writes that have not yet been
//! accepted by the remote. It holds at most one entry per record: enqueueing
//! a record that is already queued replaces its payload in place, so the
//! eventual outbound write carries the newest local state.
//!
//! ## Durability
//!
//! The stored queue is the only copy. Every mutation is a single
//! [`ISyncStateRepository::modify_pending_queue`] call that edits whatever
//! is stored at that moment, so a CLI command and the daemon can share one
//! database without dropping each other's writes. A storage error leaves
//! the stored queue as it was, and the error reaches the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::debug;

use outlay_core::domain::{PendingEntry, RecordId};
use outlay_core::ports::ISyncStateRepository;

/// What an enqueue did to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The record was not queued; it was appended at the tail
    Added,
    /// The record was queued; its payload was replaced in place
    Replaced,
    /// The record was queued with the same payload; nothing was written
    Unchanged,
}

/// Durable FIFO of pending writes, unique by record id
pub struct PendingQueue {
    repository: Arc<dyn ISyncStateRepository + Send + Sync>,
    /// Serializes this process's mutations so `count` tracks the latest one
    serial: Mutex<()>,
    count: AtomicU64,
}

impl PendingQueue {
    /// Opens the stored queue, empty if none was saved
    ///
    /// # Errors
    /// Returns an error if the stored queue cannot be read
    pub async fn load(repository: Arc<dyn ISyncStateRepository + Send + Sync>) -> Result<Self> {
        let entries = repository
            .load_pending_queue()
            .await
            .context("Failed to load pending queue")?;

        debug!(entries = entries.len(), "Pending queue loaded");

        Ok(Self {
            count: AtomicU64::new(entries.len() as u64),
            serial: Mutex::new(()),
            repository,
        })
    }

    /// Queues the latest payload for `record_id`
    ///
    /// # Errors
    /// Returns an error if the new queue cannot be persisted; the entry is
    /// then not queued
    pub async fn enqueue(&self, record_id: &RecordId, payload: Vec<u8>) -> Result<EnqueueOutcome> {
        let (outcome, _) = self.replace(record_id, payload).await?;
        Ok(outcome)
    }

    /// Like [`enqueue`](Self::enqueue), also returning the entry it replaced
    pub(crate) async fn replace(
        &self,
        record_id: &RecordId,
        payload: Vec<u8>,
    ) -> Result<(EnqueueOutcome, Option<PendingEntry>)> {
        let _serial = self.serial.lock().await;

        let mut outcome = EnqueueOutcome::Unchanged;
        let mut previous = None;
        let entries = self
            .modify(&mut |entries| {
                previous = None;
                outcome = match entries.iter_mut().find(|e| &e.record_id == record_id) {
                    Some(existing) if existing.payload == payload => EnqueueOutcome::Unchanged,
                    Some(existing) => {
                        previous = Some(existing.clone());
                        existing.payload = payload.clone();
                        EnqueueOutcome::Replaced
                    }
                    None => {
                        entries.push(PendingEntry::new(record_id.clone(), payload.clone()));
                        EnqueueOutcome::Added
                    }
                };
                outcome != EnqueueOutcome::Unchanged
            })
            .await?;

        debug!(record_id = %record_id, outcome = ?outcome, queued = entries.len(), "Enqueued local write");
        Ok((outcome, previous))
    }

    /// Snapshot of the stored queue, oldest first
    ///
    /// # Errors
    /// Returns an error if the stored queue cannot be read
    pub async fn list(&self) -> Result<Vec<PendingEntry>> {
        let entries = self
            .repository
            .load_pending_queue()
            .await
            .context("Failed to load pending queue")?;
        self.count.store(entries.len() as u64, Ordering::Release);
        Ok(entries)
    }

    /// Removes entries the remote has accepted
    ///
    /// An entry whose payload was replaced after `delivered` was read stays
    /// queued: the remote has not seen that newer payload yet.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    /// Returns an error if the new queue cannot be persisted; nothing is
    /// removed in that case
    pub async fn remove_all(&self, delivered: &[PendingEntry]) -> Result<usize> {
        let _serial = self.serial.lock().await;

        let mut removed = 0;
        let entries = self
            .modify(&mut |entries| {
                let before = entries.len();
                entries.retain(|entry| {
                    !delivered
                        .iter()
                        .any(|d| d.record_id == entry.record_id && d.payload == entry.payload)
                });
                removed = before - entries.len();
                removed > 0
            })
            .await?;

        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Removed delivered entries");
        }
        Ok(removed)
    }

    /// Drops the entry for `record_id`, if queued
    ///
    /// Returns whether an entry was removed.
    ///
    /// # Errors
    /// Returns an error if the new queue cannot be persisted
    pub async fn discard(&self, record_id: &RecordId) -> Result<bool> {
        Ok(self.take(record_id).await?.is_some())
    }

    /// Like [`discard`](Self::discard), returning the removed entry
    pub(crate) async fn take(&self, record_id: &RecordId) -> Result<Option<PendingEntry>> {
        let _serial = self.serial.lock().await;

        let mut taken = None;
        self.modify(&mut |entries| {
            taken = None;
            if let Some(index) = entries.iter().position(|e| &e.record_id == record_id) {
                taken = Some(entries.remove(index));
            }
            taken.is_some()
        })
        .await?;

        if taken.is_some() {
            debug!(record_id = %record_id, "Discarded queued write");
        }
        Ok(taken)
    }

    /// Undoes a [`replace`](Self::replace) or [`take`](Self::take)
    ///
    /// `written` is the payload the undone change left queued for
    /// `record_id` (`None` if it removed the entry); `previous` is the entry
    /// it replaced or removed. If another write has touched the record
    /// since, that newer write is kept and nothing changes.
    ///
    /// # Errors
    /// Returns an error if the new queue cannot be persisted
    pub(crate) async fn restore(
        &self,
        record_id: &RecordId,
        written: Option<&[u8]>,
        previous: Option<PendingEntry>,
    ) -> Result<()> {
        let _serial = self.serial.lock().await;

        self.modify(&mut |entries| {
            let index = entries.iter().position(|e| &e.record_id == record_id);
            if index.map(|i| entries[i].payload.as_slice()) != written {
                return false;
            }
            match (index, &previous) {
                (Some(i), Some(prev)) => entries[i].payload = prev.payload.clone(),
                (Some(i), None) => {
                    entries.remove(i);
                }
                (None, Some(prev)) => {
                    let at = entries
                        .iter()
                        .position(|e| e.enqueued_at > prev.enqueued_at)
                        .unwrap_or(entries.len());
                    entries.insert(at, prev.clone());
                }
                (None, None) => return false,
            }
            true
        })
        .await?;

        debug!(record_id = %record_id, "Restored queued write");
        Ok(())
    }

    /// Number of queued entries as of the last read or write
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    async fn modify(
        &self,
        edit: &mut (dyn for<'v> FnMut(&'v mut Vec<PendingEntry>) -> bool + Send),
    ) -> Result<Vec<PendingEntry>> {
        let entries = self
            .repository
            .modify_pending_queue(edit)
            .await
            .context("Failed to save pending queue")?;
        self.count.store(entries.len() as u64, Ordering::Release);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    use outlay_core::domain::SyncStatus;

    use super::*;

    /// Repository double that can be told to fail queue writes
    #[derive(Default)]
    struct MemoryRepository {
        queue: StdMutex<Vec<PendingEntry>>,
        saves: AtomicU64,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ISyncStateRepository for MemoryRepository {
        async fn load_pending_queue(&self) -> anyhow::Result<Vec<PendingEntry>> {
            Ok(self.queue.lock().unwrap().clone())
        }

        async fn modify_pending_queue(
            &self,
            edit: &mut (dyn for<'v> FnMut(&'v mut Vec<PendingEntry>) -> bool + Send),
        ) -> anyhow::Result<Vec<PendingEntry>> {
            let mut stored = self.queue.lock().unwrap();
            let mut next = stored.clone();
            if !edit(&mut next) {
                return Ok(next);
            }
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *stored = next.clone();
            Ok(next)
        }

        async fn load_sync_status(&self) -> anyhow::Result<Option<SyncStatus>> {
            Ok(None)
        }

        async fn save_sync_status(&self, _status: &SyncStatus) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn id(s: &str) -> RecordId {
        RecordId::new(s).unwrap()
    }

    async fn setup() -> (Arc<MemoryRepository>, PendingQueue) {
        let repo = Arc::new(MemoryRepository::default());
        let queue = PendingQueue::load(repo.clone()).await.unwrap();
        (repo, queue)
    }

    fn ids(entries: &[PendingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.record_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (_, queue) = setup().await;
        for name in ["A", "B", "C"] {
            queue.enqueue(&id(name), name.as_bytes().to_vec()).await.unwrap();
        }
        assert_eq!(ids(&queue.list().await.unwrap()), vec!["A", "B", "C"]);
        assert_eq!(queue.count(), 3);
    }

    #[tokio::test]
    async fn test_reenqueue_replaces_in_place() {
        let (repo, queue) = setup().await;
        queue.enqueue(&id("A"), b"a1".to_vec()).await.unwrap();
        queue.enqueue(&id("B"), b"b1".to_vec()).await.unwrap();
        let first_stamp = queue.list().await.unwrap()[0].enqueued_at;

        let outcome = queue.enqueue(&id("A"), b"a2".to_vec()).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Replaced);

        let entries = queue.list().await.unwrap();
        assert_eq!(ids(&entries), vec!["A", "B"]);
        assert_eq!(entries[0].payload, b"a2");
        assert_eq!(entries[0].enqueued_at, first_stamp);
        assert_eq!(repo.queue.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_identical_payload_is_not_rewritten() {
        let (repo, queue) = setup().await;
        queue.enqueue(&id("A"), b"same".to_vec()).await.unwrap();
        let outcome = queue.enqueue(&id("A"), b"same".to_vec()).await.unwrap();

        assert_eq!(outcome, EnqueueOutcome::Unchanged);
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_queue_untouched() {
        let (repo, queue) = setup().await;
        queue.enqueue(&id("A"), b"a".to_vec()).await.unwrap();

        repo.fail.store(true, Ordering::SeqCst);
        let err = queue.enqueue(&id("B"), b"b".to_vec()).await.unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
        assert!(queue.discard(&id("A")).await.is_err());

        assert_eq!(ids(&queue.list().await.unwrap()), vec!["A"]);
        assert_eq!(queue.count(), 1);
    }

    #[tokio::test]
    async fn test_remove_all_keeps_entries_replaced_after_snapshot() {
        let (_, queue) = setup().await;
        queue.enqueue(&id("A"), b"a1".to_vec()).await.unwrap();
        queue.enqueue(&id("B"), b"b1".to_vec()).await.unwrap();
        let batch = queue.list().await.unwrap();

        queue.enqueue(&id("A"), b"a2".to_vec()).await.unwrap();
        queue.enqueue(&id("C"), b"c1".to_vec()).await.unwrap();

        let removed = queue.remove_all(&batch).await.unwrap();
        assert_eq!(removed, 1);

        let remaining = queue.list().await.unwrap();
        assert_eq!(ids(&remaining), vec!["A", "C"]);
        assert_eq!(remaining[0].payload, b"a2");
    }

    #[tokio::test]
    async fn test_discard() {
        let (_, queue) = setup().await;
        queue.enqueue(&id("A"), b"a".to_vec()).await.unwrap();

        assert!(queue.discard(&id("A")).await.unwrap());
        assert!(!queue.discard(&id("A")).await.unwrap());
        assert_eq!(queue.count(), 0);
    }

    #[tokio::test]
    async fn test_load_restores_saved_queue() {
        let (repo, queue) = setup().await;
        queue.enqueue(&id("A"), vec![0xff, 0x00]).await.unwrap();
        drop(queue);

        let reloaded = PendingQueue::load(repo).await.unwrap();
        assert_eq!(reloaded.count(), 1);
        assert_eq!(reloaded.list().await.unwrap()[0].payload, vec![0xff, 0x00]);
    }

    #[tokio::test]
    async fn test_mutations_start_from_stored_queue() {
        let (repo, first) = setup().await;
        let second = PendingQueue::load(repo.clone()).await.unwrap();

        first.enqueue(&id("A"), b"a".to_vec()).await.unwrap();
        second.enqueue(&id("X"), b"x".to_vec()).await.unwrap();
        let batch = first.list().await.unwrap();
        assert_eq!(ids(&batch), vec!["A", "X"]);

        second.enqueue(&id("Y"), b"y".to_vec()).await.unwrap();
        first.remove_all(&batch).await.unwrap();

        assert_eq!(ids(&repo.queue.lock().unwrap()), vec!["Y"]);
        assert_eq!(first.count(), 1);
    }

    #[tokio::test]
    async fn test_restore_undoes_replace_and_take() {
        let (_, queue) = setup().await;
        queue.enqueue(&id("A"), b"a1".to_vec()).await.unwrap();
        queue.enqueue(&id("B"), b"b1".to_vec()).await.unwrap();

        let (_, previous) = queue.replace(&id("A"), b"a2".to_vec()).await.unwrap();
        queue.restore(&id("A"), Some(b"a2".as_slice()), previous).await.unwrap();
        assert_eq!(queue.list().await.unwrap()[0].payload, b"a1");

        let (outcome, previous) = queue.replace(&id("C"), b"c1".to_vec()).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Added);
        queue.restore(&id("C"), Some(b"c1".as_slice()), previous).await.unwrap();

        let taken = queue.take(&id("A")).await.unwrap();
        queue.restore(&id("A"), None, taken).await.unwrap();

        assert_eq!(ids(&queue.list().await.unwrap()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_restore_keeps_newer_write() {
        let (_, queue) = setup().await;
        let (_, previous) = queue.replace(&id("A"), b"a1".to_vec()).await.unwrap();
        queue.enqueue(&id("A"), b"a2".to_vec()).await.unwrap();

        queue.restore(&id("A"), Some(b"a1".as_slice()), previous).await.unwrap();

        let entries = queue.list().await.unwrap();
        assert_eq!(ids(&entries), vec!["A"]);
        assert_eq!(entries[0].payload, b"a2");
    }
}
