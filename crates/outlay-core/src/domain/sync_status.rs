//! Sync status state machine
//!
//! [`SyncStatus`] summarizes connectivity and queue state for the UI. It is a
//! pure value: the sync coordinator drives every transition and owns
//! persistence.
//!
//! ## Transitions
//!
//! ```text
//! any ──connectivity lost──→ Offline
//! Offline ──restored──→ Pending (queue non-empty) | Synced
//! Pending/Error/Synced ──sync started──→ Syncing
//! Syncing ──succeeded──→ Synced      Syncing ──failed──→ Error
//! any online, not Syncing ──record enqueued──→ Pending
//! ```
//!
//! `Syncing` is transient. [`SyncStatus::durable`] gives the form that may
//! be written to storage, and [`SyncStatus::reconcile`] recomputes the
//! state after a reload.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// `last_error` recorded when a sync is attempted without connectivity
pub const OFFLINE_ERROR: &str = "offline";

/// Coarse synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// The network is unreachable
    Offline,
    /// Everything local has reached the remote
    #[default]
    Synced,
    /// Local writes are waiting to be sent
    Pending,
    /// A sync is in flight (never persisted)
    Syncing,
    /// The last sync attempt failed
    Error,
}

impl SyncState {
    /// Returns the lowercase name used in logs and storage
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Offline => "offline",
            SyncState::Synced => "synced",
            SyncState::Pending => "pending",
            SyncState::Syncing => "syncing",
            SyncState::Error => "error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the sync engine as observed by the UI
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    state: SyncState,
    last_sync_at: Option<DateTime<Utc>>,
    pending_count: u64,
    last_error: Option<String>,
}

impl SyncStatus {
    /// Creates a `Synced` status with an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    // --- Accessors ---

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    pub fn pending_count(&self) -> u64 {
        self.pending_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // --- Derived predicates ---

    /// Returns true unless the status is `Offline`
    pub fn is_online(&self) -> bool {
        self.state != SyncState::Offline
    }

    /// Returns true if a sync is currently running
    pub fn is_syncing(&self) -> bool {
        self.state == SyncState::Syncing
    }

    /// Returns true if any local write is waiting for the remote
    pub fn has_pending_sync(&self) -> bool {
        self.pending_count > 0
    }

    /// Online and either work is queued or the last attempt failed
    ///
    /// A failed sync stays retryable even when the queue momentarily reads empty.
    pub fn can_sync(&self) -> bool {
        self.is_online() && (self.has_pending_sync() || self.state == SyncState::Error)
    }

    // --- Connectivity events ---

    /// The network went away
    pub fn connectivity_lost(&mut self) {
        self.state = SyncState::Offline;
    }

    /// A sync was requested while the probe reported no connectivity
    pub fn sync_skipped_offline(&mut self) {
        self.state = SyncState::Offline;
        self.last_error = Some(OFFLINE_ERROR.to_string());
    }

    /// The network came back
    ///
    /// Only meaningful from `Offline`; any other state is left alone.
    pub fn connectivity_restored(&mut self) {
        if self.state != SyncState::Offline {
            return;
        }
        self.state = if self.has_pending_sync() {
            SyncState::Pending
        } else {
            SyncState::Synced
        };
        if self.last_error.as_deref() == Some(OFFLINE_ERROR) {
            self.last_error = None;
        }
    }

    // --- Queue events ---

    /// A record was queued; `pending_count` is the new live queue size
    ///
    /// Moves to `Pending` unless a sync is in flight (the new entry is picked
    /// up by the next run) or the network is down.
    pub fn record_enqueued(&mut self, pending_count: u64) {
        self.pending_count = pending_count;
        match self.state {
            SyncState::Syncing | SyncState::Offline => {}
            _ if pending_count > 0 => self.state = SyncState::Pending,
            _ => {}
        }
    }

    /// A queued record was dropped before reaching the remote
    pub fn record_discarded(&mut self, pending_count: u64) {
        self.pending_count = pending_count;
        if self.state == SyncState::Pending && pending_count == 0 {
            self.state = SyncState::Synced;
        }
    }

    // --- Sync lifecycle ---

    /// Enters `Syncing` and clears the previous error
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if a sync is already running
    pub fn begin_sync(&mut self) -> Result<(), DomainError> {
        if self.state == SyncState::Syncing {
            return Err(DomainError::InvalidState {
                from: self.state.to_string(),
                to: SyncState::Syncing.to_string(),
            });
        }
        self.state = SyncState::Syncing;
        self.last_error = None;
        Ok(())
    }

    /// The remote accepted the whole batch
    pub fn sync_succeeded(&mut self, now: DateTime<Utc>) {
        self.state = SyncState::Synced;
        self.last_sync_at = Some(now);
        self.pending_count = 0;
        self.last_error = None;
    }

    /// The attempt failed; the queue (and `pending_count`) are unchanged
    pub fn sync_failed(&mut self, message: impl Into<String>) {
        self.state = SyncState::Error;
        self.last_error = Some(message.into());
    }

    // --- Persistence helpers ---

    /// Recomputes the state from the live queue size and connectivity
    ///
    /// Used after loading from storage: a stored `Syncing` is never trusted,
    /// a stored `Error` survives so the failure stays visible and retryable.
    pub fn reconcile(&mut self, pending_count: u64, online: bool) {
        self.pending_count = pending_count;
        self.state = if !online {
            SyncState::Offline
        } else if self.state == SyncState::Error {
            SyncState::Error
        } else if pending_count > 0 {
            SyncState::Pending
        } else {
            SyncState::Synced
        };
        if online && self.last_error.as_deref() == Some(OFFLINE_ERROR) {
            self.last_error = None;
        }
    }

    /// The form of this status that may be written to storage
    pub fn durable(&self) -> SyncStatus {
        let mut stored = self.clone();
        if stored.state == SyncState::Syncing {
            stored.state = if stored.pending_count > 0 {
                SyncState::Pending
            } else {
                SyncState::Synced
            };
        }
        stored
    }
}
