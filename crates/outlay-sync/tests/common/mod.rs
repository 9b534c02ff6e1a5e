//! Shared test doubles for the sync engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use outlay_core::domain::{PendingEntry, RecordId, SyncStatus};
use outlay_core::ports::{IConnectivityProbe, ISyncGateway, ISyncStateRepository};
use outlay_sync::{StaticConnectivity, SyncCoordinator};

// ============================================================================
// Repository
// ============================================================================

/// In-memory queue and status documents; either write can be made to fail
#[derive(Default)]
pub struct MemoryRepository {
    pub queue: Mutex<Vec<PendingEntry>>,
    pub status: Mutex<Option<SyncStatus>>,
    pub fail_queue_writes: AtomicBool,
    pub fail_status_writes: AtomicBool,
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
        if self.fail_queue_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        *stored = next.clone();
        Ok(next)
    }

    async fn load_sync_status(&self) -> anyhow::Result<Option<SyncStatus>> {
        Ok(self.status.lock().unwrap().clone())
    }

    async fn save_sync_status(&self, status: &SyncStatus) -> anyhow::Result<()> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            anyhow::bail!("status disk full");
        }
        *self.status.lock().unwrap() = Some(status.clone());
        Ok(())
    }
}

// ============================================================================
// Gateways
// ============================================================================

/// Records every batch; fails while `fail` is set
#[derive(Default)]
pub struct CountingGateway {
    pub calls: AtomicUsize,
    pub batches: Mutex<Vec<Vec<PendingEntry>>>,
    pub fail: AtomicBool,
}

impl CountingGateway {
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_batch_ids(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .last()
            .map(|b| b.iter().map(|e| e.record_id.to_string()).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ISyncGateway for CountingGateway {
    async fn submit(&self, batch: &[PendingEntry]) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("HTTP 503 Service Unavailable");
        }
        Ok(())
    }
}

/// Blocks inside `submit` until released
#[derive(Default)]
pub struct GatedGateway {
    pub calls: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedGateway {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ISyncGateway for GatedGateway {
    async fn submit(&self, _batch: &[PendingEntry]) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

/// Never answers
pub struct HangingGateway;

#[async_trait::async_trait]
impl ISyncGateway for HangingGateway {
    async fn submit(&self, _batch: &[PendingEntry]) -> anyhow::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn id(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

pub async fn open_coordinator(
    repository: Arc<MemoryRepository>,
    probe: Arc<StaticConnectivity>,
    gateway: Arc<dyn ISyncGateway + Send + Sync>,
) -> Arc<SyncCoordinator> {
    let probe: Arc<dyn IConnectivityProbe + Send + Sync> = probe;
    Arc::new(
        SyncCoordinator::open(repository, probe, gateway)
            .await
            .expect("open coordinator"),
    )
}

/// Coordinator over fresh in-memory state, online
pub async fn online_setup<G>(gateway: Arc<G>) -> (Arc<SyncCoordinator>, Arc<StaticConnectivity>)
where
    G: ISyncGateway + Send + Sync + 'static,
{
    let probe = Arc::new(StaticConnectivity::new(true));
    let coordinator = open_coordinator(
        Arc::new(MemoryRepository::default()),
        Arc::clone(&probe),
        gateway,
    )
    .await;
    (coordinator, probe)
}
