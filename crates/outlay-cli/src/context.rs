//! Shared command context
//!
//! Every command that touches expenses or sync state goes through
//! [`AppContext::open`], which wires the SQLite adapters, the connectivity
//! probe and the drop-directory gateway into a [`SyncCoordinator`] the same
//! way the daemon does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use outlay_cache::{DatabasePool, SqliteRecordStore, SqliteSyncStateRepository};
use outlay_core::config::Config;
use outlay_core::ports::{IConnectivityProbe, ILocalWriteSink, IRecordStore};
use outlay_sync::{DropDirectoryGateway, StaticConnectivity, SyncCoordinator, TcpConnectivityProbe};

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Alternate config file (`--config`)
    pub config: Option<PathBuf>,
    /// Treat the network as unreachable (`--offline`)
    pub offline: bool,
    /// Minimal output (`--quiet`)
    pub quiet: bool,
}

impl GlobalArgs {
    /// Config file in effect: `--config` or the per-user default
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Loads the config file, falling back to defaults when it is missing
    ///
    /// An explicitly given file that cannot be read is an error.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => Ok(Config::load_or_default(&Config::default_path())),
        }
    }
}

/// Opened storage and sync engine for one command invocation
pub struct AppContext {
    pub config: Config,
    pub pool: DatabasePool,
    pub records: Arc<dyn IRecordStore + Send + Sync>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl AppContext {
    /// Opens the database and the sync coordinator described by the config
    pub async fn open(global: &GlobalArgs) -> Result<Self> {
        let config = global.load_config()?;
        let errors = config.validate();
        if !errors.is_empty() {
            let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::bail!("Invalid configuration: {}", joined.join("; "));
        }

        let pool = DatabasePool::new(&config.storage.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database at {}",
                    config.storage.database.display()
                )
            })?;

        let records = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
        let repository = Arc::new(SqliteSyncStateRepository::new(pool.pool().clone()));

        let probe: Arc<dyn IConnectivityProbe + Send + Sync> = if global.offline {
            debug!("Connectivity forced offline");
            Arc::new(StaticConnectivity::new(false))
        } else {
            Arc::new(TcpConnectivityProbe::from_config(&config.connectivity))
        };
        let gateway = Arc::new(DropDirectoryGateway::new(config.remote.drop_dir.clone()));

        let coordinator = SyncCoordinator::open(repository, probe, gateway)
            .await
            .context("Failed to open sync state")?
            .with_gateway_timeout(Duration::from_secs(config.sync.gateway_timeout_secs));

        Ok(Self {
            config,
            pool,
            records,
            coordinator: Arc::new(coordinator),
        })
    }

    /// The coordinator as the write sink the use cases report to
    pub fn sink(&self) -> Arc<dyn ILocalWriteSink + Send + Sync> {
        Arc::clone(&self.coordinator) as Arc<dyn ILocalWriteSink + Send + Sync>
    }

    /// Closes the database pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
