//! Sync coordinator
//!
//! The [`SyncCoordinator`] is the single owner of a pending queue and its
//! sync status. Local writes enter through
//! [`notify_local_write`](SyncCoordinator::notify_local_write) and never wait
//! on the network; [`run_sync`](SyncCoordinator::run_sync) is the only
//! operation that talks to the remote.
//!
//! ## Sync Flow
//!
//! 1. **Guard**: at most one sync runs; a concurrent call returns
//!    [`SyncError::AlreadyInProgress`] without touching the network
//! 2. **Probe**: offline means `Offline` with `last_error = "offline"` and
//!    no gateway call
//! 3. **Snapshot**: the queue is read once; an empty queue completes
//!    immediately as a successful sync
//! 4. **Submit**: the whole batch goes to the gateway in one call, bounded
//!    by the gateway timeout
//! 5. **Settle**: on success the delivered entries are removed; on failure
//!    the queue is left exactly as it was and the status moves to `Error`
//!
//! Nothing is retried inside a sync; the scheduler decides when to try
//! again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use outlay_core::domain::{PendingEntry, RecordId, SyncStatus};
use outlay_core::ports::{
    IConnectivityProbe, ILocalWriteSink, ISyncGateway, ISyncStateRepository, ISyncStatusObserver,
};

use crate::notifier::{StatusNotifier, SubscriptionId};
use crate::queue::{EnqueueOutcome, PendingQueue};
use crate::SyncError;

/// Default bound on a single gateway submission
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of entries the remote accepted
    pub records_sent: usize,
    /// The `last_sync_at` recorded for this sync
    pub synced_at: DateTime<Utc>,
    /// Wall-clock duration of the sync in milliseconds
    pub duration_ms: u64,
}

// ============================================================================
// Single-flight guard
// ============================================================================

/// Holds the in-flight slot; releasing happens on drop, including on
/// early return and panic
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// SyncCoordinator
// ============================================================================

/// Owns the pending queue and sync status, and runs syncs against the gateway
pub struct SyncCoordinator {
    queue: PendingQueue,
    repository: Arc<dyn ISyncStateRepository + Send + Sync>,
    probe: Arc<dyn IConnectivityProbe + Send + Sync>,
    gateway: Arc<dyn ISyncGateway + Send + Sync>,
    /// Never held across an `.await`
    status: Mutex<SyncStatus>,
    /// Serializes mutate-then-publish so observers see transitions in order
    publish_order: Mutex<()>,
    notifier: StatusNotifier,
    in_flight: AtomicBool,
    persist_lock: tokio::sync::Mutex<()>,
    gateway_timeout: Duration,
}

impl SyncCoordinator {
    /// Loads the persisted queue and status and reconciles them
    ///
    /// A stored `Syncing` state is never trusted: the status is recomputed
    /// from the live queue size and the probe. A stored `Error` survives so
    /// the failure stays visible until the next sync.
    ///
    /// # Errors
    /// Returns an error if either document cannot be read or the reconciled
    /// status cannot be written back
    pub async fn open(
        repository: Arc<dyn ISyncStateRepository + Send + Sync>,
        probe: Arc<dyn IConnectivityProbe + Send + Sync>,
        gateway: Arc<dyn ISyncGateway + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let queue = PendingQueue::load(Arc::clone(&repository)).await?;
        let mut status = repository
            .load_sync_status()
            .await
            .context("Failed to load sync status")?
            .unwrap_or_default();

        let online = probe.is_online().await;
        status.reconcile(queue.count(), online);

        info!(
            state = %status.state(),
            pending = status.pending_count(),
            online,
            "Sync coordinator opened"
        );

        let coordinator = Self {
            queue,
            repository,
            probe,
            gateway,
            notifier: StatusNotifier::new(status.clone()),
            status: Mutex::new(status),
            publish_order: Mutex::new(()),
            in_flight: AtomicBool::new(false),
            persist_lock: tokio::sync::Mutex::new(()),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        };
        coordinator.persist_status().await?;
        Ok(coordinator)
    }

    /// Overrides the gateway timeout
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    // --- Reads ---

    /// Current status; never blocks on I/O
    pub fn status(&self) -> SyncStatus {
        self.lock_status().clone()
    }

    pub fn can_sync(&self) -> bool {
        self.lock_status().can_sync()
    }

    pub fn pending_count(&self) -> u64 {
        self.queue.count()
    }

    /// Snapshot of the queued writes, oldest first
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if the queue cannot be read
    pub async fn pending_entries(&self) -> Result<Vec<PendingEntry>, SyncError> {
        self.queue.list().await.map_err(|e| SyncError::storage(&e))
    }

    pub fn gateway_timeout(&self) -> Duration {
        self.gateway_timeout
    }

    // --- Observers ---

    pub fn subscribe(&self, observer: Arc<dyn ISyncStatusObserver>) -> SubscriptionId {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.notifier.watch()
    }

    // --- Local writes ---

    /// Queues the latest payload of a record and marks the status pending
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if the queue or the status cannot be
    /// persisted; the write is then not queued
    pub async fn notify_local_write(
        &self,
        record_id: &RecordId,
        payload: Vec<u8>,
    ) -> Result<EnqueueOutcome, SyncError> {
        let (outcome, previous) = self
            .queue
            .replace(record_id, payload.clone())
            .await
            .map_err(|e| SyncError::storage(&e))?;

        if outcome != EnqueueOutcome::Unchanged {
            self.apply(|s| s.record_enqueued(self.queue.count()));
            if let Err(err) = self.persist_status().await {
                self.undo_queue_change(record_id, Some(payload.as_slice()), previous)
                    .await;
                return Err(err);
            }
        }
        Ok(outcome)
    }

    /// Drops a record deleted locally before it reached the remote
    ///
    /// Returns whether the record was queued.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if the queue or the status cannot be
    /// persisted; the entry then stays queued
    pub async fn discard_local_write(&self, record_id: &RecordId) -> Result<bool, SyncError> {
        let taken = self
            .queue
            .take(record_id)
            .await
            .map_err(|e| SyncError::storage(&e))?;

        let Some(entry) = taken else {
            return Ok(false);
        };
        self.apply(|s| s.record_discarded(self.queue.count()));
        if let Err(err) = self.persist_status().await {
            self.undo_queue_change(record_id, None, Some(entry)).await;
            return Err(err);
        }
        Ok(true)
    }

    // --- Connectivity ---

    /// Applies an online/offline transition reported by a probe
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if the new status cannot be persisted;
    /// the in-memory status has still moved
    pub async fn handle_connectivity_change(&self, online: bool) -> Result<(), SyncError> {
        if self.lock_status().is_online() == online {
            return Ok(());
        }
        if online {
            info!("Connectivity restored");
            self.apply(|s| s.connectivity_restored());
        } else {
            info!("Connectivity lost");
            self.apply(|s| s.connectivity_lost());
        }
        self.persist_status().await
    }

    /// Re-probes connectivity and recomputes the status from the live queue
    ///
    /// Has no effect while a sync is running.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if the queue cannot be read or the
    /// status cannot be persisted
    pub async fn refresh_status(&self) -> Result<SyncStatus, SyncError> {
        let online = self.probe.is_online().await;
        let pending = self.pending_entries().await?.len() as u64;
        let status = self.apply(|s| {
            if !s.is_syncing() {
                s.reconcile(pending, online);
            }
            s.clone()
        });
        self.persist_status().await?;
        Ok(status)
    }

    // --- Sync ---

    /// Pushes the whole pending queue to the gateway as one batch
    ///
    /// # Errors
    /// - [`SyncError::AlreadyInProgress`] if another sync is running
    /// - [`SyncError::Offline`] if the probe reports no connectivity
    /// - [`SyncError::RemoteRejected`] if the gateway fails or times out;
    ///   the queue is left untouched
    /// - [`SyncError::Storage`] if the queue cannot be read, delivered
    ///   entries cannot be removed, or the status cannot be persisted
    #[tracing::instrument(skip(self))]
    pub async fn run_sync(&self) -> Result<SyncReport, SyncError> {
        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Sync requested while another is running");
            return Err(SyncError::AlreadyInProgress);
        };
        let start = Instant::now();

        if !self.probe.is_online().await {
            info!("Skipping sync: offline");
            self.apply(|s| s.sync_skipped_offline());
            self.persist_status().await?;
            return Err(SyncError::Offline);
        }

        self.apply(|s| s.begin_sync())?;

        let batch = match self.queue.list().await {
            Ok(batch) => batch,
            Err(err) => return self.fail_sync(SyncError::storage(&err)).await,
        };
        if batch.is_empty() {
            let now = Utc::now();
            self.apply(|s| s.sync_succeeded(now));
            self.persist_status().await?;
            debug!("Nothing to sync");
            return Ok(SyncReport {
                records_sent: 0,
                synced_at: now,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        info!(records = batch.len(), "Submitting pending batch");

        let submitted =
            match tokio::time::timeout(self.gateway_timeout, self.gateway.submit(&batch)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(format!("{err:#}")),
                Err(_) => Err(format!(
                    "gateway timed out after {}s",
                    self.gateway_timeout.as_secs_f64()
                )),
            };

        if let Err(message) = submitted {
            warn!(error = %message, pending = batch.len(), "Sync failed");
            return self.fail_sync(SyncError::RemoteRejected(message)).await;
        }

        if let Err(err) = self.queue.remove_all(&batch).await {
            let sync_err = SyncError::storage(&err);
            warn!(error = %sync_err, "Delivered batch could not be removed from the queue");
            return self.fail_sync(sync_err).await;
        }

        let now = Utc::now();
        self.apply(|s| s.sync_succeeded(now));
        if self.queue.count() > 0 {
            // Writes made during the submit surface as pending again
            self.apply(|s| s.record_enqueued(self.queue.count()));
        }
        self.persist_status().await?;

        let report = SyncReport {
            records_sent: batch.len(),
            synced_at: now,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            records = report.records_sent,
            duration_ms = report.duration_ms,
            remaining = self.queue.count(),
            "Sync completed"
        );
        Ok(report)
    }

    // --- Internals ---

    fn lock_status(&self) -> std::sync::MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates the status and notifies observers with the result
    ///
    /// Observers run while `publish_order` is held. They may read the
    /// coordinator but must not drive a transition from inside the callback.
    fn apply<R>(&self, f: impl FnOnce(&mut SyncStatus) -> R) -> R {
        let _order = self
            .publish_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (result, snapshot) = {
            let mut status = self.lock_status();
            let result = f(&mut status);
            (result, status.clone())
        };
        self.notifier.publish(&snapshot);
        result
    }

    /// Moves the status to `Error` and ends a sync with `err`
    ///
    /// A status that cannot be persisted replaces `err`: the caller must
    /// learn that the stored state is behind.
    async fn fail_sync(&self, err: SyncError) -> Result<SyncReport, SyncError> {
        let message = match &err {
            SyncError::RemoteRejected(message) => message.clone(),
            other => other.to_string(),
        };
        self.apply(|s| s.sync_failed(message));
        self.persist_status().await?;
        Err(err)
    }

    /// Puts the queue back after a change whose status could not be saved
    async fn undo_queue_change(
        &self,
        record_id: &RecordId,
        written: Option<&[u8]>,
        previous: Option<PendingEntry>,
    ) {
        if let Err(err) = self.queue.restore(record_id, written, previous).await {
            warn!(record_id = %record_id, error = %format!("{err:#}"), "Failed to undo queue change");
        }
        let pending = self.queue.count();
        self.apply(|s| {
            if pending > s.pending_count() {
                s.record_enqueued(pending);
            } else {
                s.record_discarded(pending);
            }
        });
    }

    /// Writes the durable form of the current status
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if the status document cannot be saved
    async fn persist_status(&self) -> Result<(), SyncError> {
        let _serial = self.persist_lock.lock().await;
        let durable = self.status().durable();
        self.repository
            .save_sync_status(&durable)
            .await
            .context("Failed to save sync status")
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "Sync status not persisted");
                SyncError::storage(&e)
            })
    }
}

#[async_trait::async_trait]
impl ILocalWriteSink for SyncCoordinator {
    async fn notify_local_write(&self, record_id: &RecordId, payload: Vec<u8>) -> anyhow::Result<()> {
        SyncCoordinator::notify_local_write(self, record_id, payload).await?;
        Ok(())
    }

    async fn discard_local_write(&self, record_id: &RecordId) -> anyhow::Result<()> {
        SyncCoordinator::discard_local_write(self, record_id).await?;
        Ok(())
    }
}
