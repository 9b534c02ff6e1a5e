//! Connectivity probe port (driven/secondary port)
//!
//! Supplies the "is the network reachable" signal. Probes may additionally
//! publish online/offline transitions; consumers must work with polling
//! alone when no subscription is offered.

use tokio::sync::watch;

/// Port trait for network reachability
#[async_trait::async_trait]
pub trait IConnectivityProbe: Send + Sync {
    /// Returns whether the network is currently reachable
    async fn is_online(&self) -> bool;

    /// Subscribes to online/offline transitions, if the probe supports it
    ///
    /// The receiver holds the latest known value; `changed()` resolves on
    /// each transition.
    fn subscribe(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}
