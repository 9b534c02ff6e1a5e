//! Integration tests for SyncScheduler and ConnectivityWatcher
//!
//! Timing-sensitive tests run on a paused clock, which tokio advances
//! automatically whenever every task is idle.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use outlay_core::domain::{PendingEntry, SyncState};
use outlay_core::ports::IConnectivityProbe;
use outlay_sync::{
    Backoff, ConnectivityWatcher, StaticConnectivity, SyncError, SyncScheduler,
};

use common::{id, online_setup, open_coordinator, CountingGateway, MemoryRepository};

fn backoff(base_secs: u64, max_secs: u64) -> Backoff {
    Backoff::new(Duration::from_secs(base_secs), Duration::from_secs(max_secs))
}

#[tokio::test(start_paused = true)]
async fn test_periodic_tick_syncs_pending_work() {
    let gateway = Arc::new(CountingGateway::default());
    let (coordinator, _) = online_setup(Arc::clone(&gateway)).await;
    coordinator.notify_local_write(&id("a"), b"1".to_vec()).await.unwrap();

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(
        Arc::clone(&coordinator),
        Duration::from_secs(60),
        backoff(2, 300),
    );
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gateway.calls(), 1);
    assert_eq!(coordinator.status().state(), SyncState::Synced);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_tick_sees_writes_queued_elsewhere() {
    let gateway = Arc::new(CountingGateway::default());
    let repository = Arc::new(MemoryRepository::default());
    let probe = Arc::new(StaticConnectivity::new(true));
    let coordinator = open_coordinator(Arc::clone(&repository), probe, gateway.clone()).await;

    repository
        .queue
        .lock()
        .unwrap()
        .push(PendingEntry::new(id("from-cli"), b"1".to_vec()));

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(coordinator, Duration::from_secs(10), backoff(2, 300));
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(15)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(gateway.calls(), 1);
    assert_eq!(gateway.last_batch_ids(), vec!["from-cli"]);
    assert!(repository.queue.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_tick_idles_without_work() {
    let gateway = Arc::new(CountingGateway::default());
    let (coordinator, _) = online_setup(Arc::clone(&gateway)).await;

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(coordinator, Duration::from_secs(10), backoff(2, 300));
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(95)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(gateway.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failures_back_off_periodic_attempts() {
    let gateway = Arc::new(CountingGateway::failing());
    let (coordinator, _) = online_setup(Arc::clone(&gateway)).await;
    coordinator.notify_local_write(&id("a"), b"1".to_vec()).await.unwrap();

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(coordinator, Duration::from_secs(1), backoff(10, 100));
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    // Attempts at t=0 and t=10; the next waits until t=30
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(gateway.calls(), 2);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_attempt_updates_backoff() {
    let gateway = Arc::new(CountingGateway::failing());
    let (coordinator, probe) = online_setup(Arc::clone(&gateway)).await;
    coordinator.notify_local_write(&id("a"), b"1".to_vec()).await.unwrap();
    let mut scheduler = SyncScheduler::new(coordinator, Duration::from_secs(60), backoff(2, 300));

    assert!(scheduler.attempt("test").await.is_err());
    assert!(scheduler.attempt("test").await.is_err());
    assert_eq!(scheduler.backoff().failures(), 2);
    assert_eq!(scheduler.backoff().delay(), Some(Duration::from_secs(4)));

    // Offline is not a failure
    probe.set_online(false);
    assert!(matches!(
        scheduler.attempt("test").await,
        Err(SyncError::Offline)
    ));
    assert_eq!(scheduler.backoff().failures(), 2);

    probe.set_online(true);
    gateway.fail.store(false, Ordering::SeqCst);
    scheduler.attempt("test").await.unwrap();
    assert_eq!(scheduler.backoff().failures(), 0);
}

#[tokio::test]
async fn test_manual_request_runs_sync() {
    let gateway = Arc::new(CountingGateway::default());
    let (coordinator, _) = online_setup(Arc::clone(&gateway)).await;

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(
        Arc::clone(&coordinator),
        Duration::from_secs(3600),
        backoff(2, 300),
    );
    let trigger = scheduler.trigger();
    let mut status_rx = coordinator.watch();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    // An empty-queue sync still stamps last_sync_at
    trigger.request_sync();
    tokio::time::timeout(
        Duration::from_secs(5),
        status_rx.wait_for(|s| s.last_sync_at().is_some()),
    )
    .await
    .expect("manual sync did not run")
    .unwrap();

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_reconnect_triggers_sync() {
    let gateway = Arc::new(CountingGateway::default());
    let probe = Arc::new(StaticConnectivity::new(false));
    let coordinator = open_coordinator(
        Arc::new(MemoryRepository::default()),
        Arc::clone(&probe),
        gateway.clone(),
    )
    .await;
    coordinator.notify_local_write(&id("a"), b"1".to_vec()).await.unwrap();
    coordinator.notify_local_write(&id("b"), b"2".to_vec()).await.unwrap();
    assert_eq!(coordinator.status().state(), SyncState::Offline);

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(
        Arc::clone(&coordinator),
        Duration::from_secs(3600),
        backoff(2, 300),
    );
    let watcher =
        ConnectivityWatcher::new(Arc::clone(&coordinator)).with_sync_on_reconnect(scheduler.trigger());
    let transitions = probe.subscribe().unwrap();
    let mut status_rx = coordinator.watch();

    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));
    let watcher_handle = tokio::spawn(watcher.run(transitions, shutdown.clone()));

    probe.set_online(true);
    tokio::time::timeout(
        Duration::from_secs(5),
        status_rx.wait_for(|s| s.state() == SyncState::Synced && s.pending_count() == 0),
    )
    .await
    .expect("reconnect did not sync")
    .unwrap();
    assert_eq!(gateway.calls(), 1);

    shutdown.cancel();
    scheduler_handle.await.unwrap();
    watcher_handle.await.unwrap();
}

#[tokio::test]
async fn test_watcher_applies_connectivity_loss() {
    let gateway = Arc::new(CountingGateway::default());
    let (coordinator, probe) = online_setup(gateway).await;
    let mut status_rx = coordinator.watch();

    let shutdown = CancellationToken::new();
    let watcher = ConnectivityWatcher::new(Arc::clone(&coordinator));
    let handle = tokio::spawn(watcher.run(probe.subscribe().unwrap(), shutdown.clone()));

    probe.set_online(false);
    tokio::time::timeout(
        Duration::from_secs(5),
        status_rx.wait_for(|s| s.state() == SyncState::Offline),
    )
    .await
    .expect("loss not applied")
    .unwrap();

    shutdown.cancel();
    handle.await.unwrap();
}
