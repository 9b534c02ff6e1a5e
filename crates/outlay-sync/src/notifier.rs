//! Status observer registry
//!
//! Observers are called synchronously, in subscription order, after each
//! transition. A `tokio::sync::watch` channel carries the same updates to
//! async consumers that would rather await changes than register a callback.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use outlay_core::domain::SyncStatus;
use outlay_core::ports::ISyncStatusObserver;

/// Handle returned by [`StatusNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<(SubscriptionId, Arc<dyn ISyncStatusObserver>)>,
}

/// Fans status changes out to observers and watch receivers
pub struct StatusNotifier {
    registry: Mutex<Registry>,
    watch_tx: watch::Sender<SyncStatus>,
}

impl StatusNotifier {
    pub fn new(initial: SyncStatus) -> Self {
        let (watch_tx, _) = watch::channel(initial);
        Self {
            registry: Mutex::new(Registry::default()),
            watch_tx,
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn ISyncStatusObserver>) -> SubscriptionId {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.observers.push((id, observer));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.observers.len();
        registry.observers.retain(|(sub, _)| *sub != id);
        registry.observers.len() != before
    }

    /// A receiver that always holds the latest published status
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.watch_tx.subscribe()
    }

    /// Delivers `status` to every observer
    ///
    /// The registry lock is released before callbacks run, so an observer
    /// may subscribe or unsubscribe from inside its callback.
    pub fn publish(&self, status: &SyncStatus) {
        let observers: Vec<Arc<dyn ISyncStatusObserver>> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
        };

        self.watch_tx.send_replace(status.clone());
        for observer in observers {
            observer.on_status_changed(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use outlay_core::domain::SyncState;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<SyncState>>>, Arc<dyn ISyncStatusObserver>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn ISyncStatusObserver> = Arc::new(move |s: &SyncStatus| {
            sink.lock().unwrap().push(s.state());
        });
        (seen, observer)
    }

    #[test]
    fn test_publish_reaches_observers_in_order() {
        let notifier = StatusNotifier::new(SyncStatus::new());
        let (seen, observer) = recorder();
        notifier.subscribe(observer);

        let mut status = SyncStatus::new();
        status.record_enqueued(1);
        notifier.publish(&status);
        status.connectivity_lost();
        notifier.publish(&status);

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[SyncState::Pending, SyncState::Offline]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = StatusNotifier::new(SyncStatus::new());
        let (seen, observer) = recorder();
        let id = notifier.subscribe(observer);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.publish(&SyncStatus::new());

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_watch_holds_latest() {
        let notifier = StatusNotifier::new(SyncStatus::new());
        let rx = notifier.watch();

        let mut status = SyncStatus::new();
        status.sync_failed("boom");
        notifier.publish(&status);

        assert_eq!(rx.borrow().state(), SyncState::Error);
    }
}
