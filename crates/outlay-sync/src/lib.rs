//! Outlay Sync - Offline-first synchronization engine
//!
//! Provides:
//! - A durable outbox of local writes (the pending queue)
//! - A single-flight coordinator that pushes the outbox to the remote
//! - Periodic, manual and reconnect-triggered scheduling with backoff
//! - Connectivity probes and a drop-directory gateway
//!
//! ## Modules
//!
//! - [`queue`] - Persisted pending queue with upsert semantics
//! - [`notifier`] - Status observer registry
//! - [`coordinator`] - Sync coordinator owning the queue/status pair
//! - [`scheduler`] - Timer and manual triggers with exponential backoff
//! - [`connectivity`] - Static and TCP connectivity probes
//! - [`gateway`] - Drop-directory remote gateway

pub mod connectivity;
pub mod coordinator;
pub mod gateway;
pub mod notifier;
pub mod queue;
pub mod scheduler;

pub use connectivity::{ConnectivityWatcher, StaticConnectivity, TcpConnectivityProbe};
pub use coordinator::{SyncCoordinator, SyncReport};
pub use gateway::DropDirectoryGateway;
pub use notifier::{StatusNotifier, SubscriptionId};
pub use queue::{EnqueueOutcome, PendingQueue};
pub use scheduler::{Backoff, SyncScheduler, SyncTrigger};

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading or writing the queue or status documents failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The connectivity probe reported no network; nothing was sent
    #[error("offline")]
    Offline,

    /// The gateway failed or timed out; the queue is untouched
    #[error("Remote rejected batch: {0}")]
    RemoteRejected(String),

    /// Another sync is already running
    #[error("sync already in progress")]
    AlreadyInProgress,

    /// A domain-level error propagated from outlay-core
    #[error("Domain error: {0}")]
    DomainError(#[from] outlay_core::domain::DomainError),
}

impl SyncError {
    /// Wraps a storage failure, keeping the whole context chain
    pub fn storage(err: &anyhow::Error) -> Self {
        SyncError::Storage(format!("{err:#}"))
    }

    /// Whether a later attempt may succeed without any local change
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::RemoteRejected(_))
    }

    /// Outcomes that are part of normal operation rather than failures
    pub fn is_expected(&self) -> bool {
        matches!(self, SyncError::Offline | SyncError::AlreadyInProgress)
    }
}
