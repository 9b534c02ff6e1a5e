//! Sync status observer port (driven/secondary port)
//!
//! UI bindings register an observer to be told about every sync status
//! transition.
//!
//! ## Design Notes
//!
//! - Observers are called synchronously right after each transition, with
//!   no buffering or coalescing.
//! - Callbacks run on the task that caused the transition and must return
//!   quickly; anything slow belongs on a channel.
//! - Callbacks run while the engine holds the lock that orders
//!   notifications. Reading status or queue size from inside a callback is
//!   fine; queueing a write, syncing or reporting connectivity must be
//!   deferred (for example with `tokio::spawn`), or the callback deadlocks.
//! - Any `Fn(&SyncStatus)` closure is an observer.

use crate::domain::SyncStatus;

/// Port trait for sync status change notifications
///
/// Implementations must not call back into the engine's write, sync or
/// connectivity operations from `on_status_changed`; see the module notes.
pub trait ISyncStatusObserver: Send + Sync {
    /// Called after every transition with the new status
    fn on_status_changed(&self, status: &SyncStatus);
}

impl<F> ISyncStatusObserver for F
where
    F: Fn(&SyncStatus) + Send + Sync,
{
    fn on_status_changed(&self, status: &SyncStatus) {
        self(status)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_closure_is_observer() {
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        let observer = move |status: &SyncStatus| {
            counter.store(status.pending_count() + 1, Ordering::SeqCst);
        };

        let dyn_observer: &dyn ISyncStatusObserver = &observer;
        dyn_observer.on_status_changed(&SyncStatus::new());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
