//! Outlay Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Probing network reachability
//! - Periodic and on-reconnect syncs of the pending queue
//! - Exponential backoff after failed syncs
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the local database, builds a `SyncCoordinator` over it
//! and runs three tasks until a `CancellationToken` triggered by SIGTERM or
//! SIGINT stops them: the connectivity monitor, the connectivity watcher
//! and the sync scheduler.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use outlay_cache::{DatabasePool, SqliteSyncStateRepository};
use outlay_core::{config::Config, domain::SyncStatus, ports::IConnectivityProbe};
use outlay_sync::{
    Backoff, ConnectivityWatcher, DropDirectoryGateway, SyncCoordinator, SyncScheduler,
    TcpConnectivityProbe,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming an alternate config file
const CONFIG_ENV: &str = "OUTLAY_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that owns the sync engine and its background tasks
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Database pool shared by the repositories
    db_pool: DatabasePool,
    /// Reachability probe, also driven by the monitor task
    probe: Arc<TcpConnectivityProbe>,
    /// The sync engine
    coordinator: Arc<SyncCoordinator>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a new DaemonService
    ///
    /// Opens the database and the coordinator described by `config`.
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::new(&config.storage.database)
            .await
            .context("Failed to open database")?;
        let repository = Arc::new(SqliteSyncStateRepository::new(db_pool.pool().clone()));

        let probe = Arc::new(TcpConnectivityProbe::from_config(&config.connectivity));
        let gateway = Arc::new(DropDirectoryGateway::new(config.remote.drop_dir.clone()));

        let coordinator = SyncCoordinator::open(
            repository,
            Arc::clone(&probe) as Arc<dyn IConnectivityProbe + Send + Sync>,
            gateway,
        )
        .await
        .context("Failed to open sync state")?
        .with_gateway_timeout(Duration::from_secs(config.sync.gateway_timeout_secs));

        Ok(Self {
            config,
            db_pool,
            probe,
            coordinator: Arc::new(coordinator),
            shutdown,
        })
    }

    /// Backoff policy described by the config
    fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.config.sync.backoff_base_secs),
            Duration::from_secs(self.config.sync.backoff_max_secs),
        )
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Runs the background tasks until shutdown
    ///
    /// 1. Starts the connectivity monitor
    /// 2. Starts the watcher that feeds transitions to the coordinator
    /// 3. Runs the scheduler on the current task
    async fn run(self) -> Result<()> {
        let subscription = self.coordinator.subscribe(Arc::new(|status: &SyncStatus| {
            info!(
                state = %status.state(),
                pending = status.pending_count(),
                error = status.last_error().unwrap_or(""),
                "Sync status changed"
            );
        }));

        let monitor = Arc::clone(&self.probe).spawn_monitor(self.shutdown.clone());

        let scheduler = SyncScheduler::new(
            Arc::clone(&self.coordinator),
            Duration::from_secs(self.config.sync.interval_secs),
            self.backoff(),
        );

        let mut watcher = ConnectivityWatcher::new(Arc::clone(&self.coordinator));
        if self.config.sync.sync_on_reconnect {
            watcher = watcher.with_sync_on_reconnect(scheduler.trigger());
        }
        let watcher_task = self
            .probe
            .subscribe()
            .map(|transitions| tokio::spawn(watcher.run(transitions, self.shutdown.clone())));

        info!(
            interval_secs = self.config.sync.interval_secs,
            pending = self.coordinator.pending_count(),
            remote = %self.config.remote.drop_dir.display(),
            "Starting sync scheduler"
        );
        scheduler.run(self.shutdown.clone()).await;

        if let Err(e) = monitor.await {
            warn!(error = %e, "Connectivity monitor ended abnormally");
        }
        if let Some(task) = watcher_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Connectivity watcher ended abnormally");
            }
        }

        self.coordinator.unsubscribe(subscription);
        self.db_pool.close().await;
        info!("Background tasks stopped");
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

/// Config file in effect: `$OUTLAY_CONFIG` or the per-user default
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path();
    let config = Config::load_or_default(&config_path);

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(config_path = %config_path.display(), "Outlay daemon starting (outlayd)");

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, message = %e.message, "Invalid configuration");
        }
        anyhow::bail!("Invalid configuration in {}", config_path.display());
    }

    // Cancellation token propagated to all tasks
    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;

    let result = service.run().await;

    match &result {
        Ok(()) => info!("Outlay daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Outlay daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
