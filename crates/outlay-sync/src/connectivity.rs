//! Connectivity probes and the transition watcher
//!
//! - [`StaticConnectivity`]: a flag set by hand (tests, `--offline`)
//! - [`TcpConnectivityProbe`]: reachable when a TCP connect to a known
//!   host succeeds within a timeout; a background monitor publishes
//!   transitions
//! - [`ConnectivityWatcher`]: feeds probe transitions into the coordinator
//!   and optionally requests a sync on reconnect

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use outlay_core::config::ConnectivityConfig;
use outlay_core::ports::IConnectivityProbe;

use crate::coordinator::SyncCoordinator;
use crate::scheduler::SyncTrigger;

/// Publishes `online` on `tx` only if it differs from the current value
fn publish_transition(tx: &watch::Sender<bool>, online: bool) -> bool {
    tx.send_if_modified(|current| {
        if *current == online {
            false
        } else {
            *current = online;
            true
        }
    })
}

// ============================================================================
// StaticConnectivity
// ============================================================================

/// Connectivity flag controlled by the caller
pub struct StaticConnectivity {
    tx: watch::Sender<bool>,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Changes the flag, notifying subscribers if it actually changed
    pub fn set_online(&self, online: bool) {
        if publish_transition(&self.tx, online) {
            debug!(online, "Static connectivity changed");
        }
    }
}

#[async_trait::async_trait]
impl IConnectivityProbe for StaticConnectivity {
    async fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> Option<watch::Receiver<bool>> {
        Some(self.tx.subscribe())
    }
}

// ============================================================================
// TcpConnectivityProbe
// ============================================================================

/// Reachability check by TCP connect
pub struct TcpConnectivityProbe {
    host: String,
    port: u16,
    timeout: Duration,
    interval: Duration,
    tx: watch::Sender<bool>,
}

impl TcpConnectivityProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration, interval: Duration) -> Self {
        // Assume online until the first probe says otherwise
        let (tx, _) = watch::channel(true);
        Self {
            host: host.into(),
            port,
            timeout,
            interval,
            tx,
        }
    }

    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self::new(
            config.probe_host.clone(),
            config.probe_port,
            Duration::from_millis(config.probe_timeout_ms),
            Duration::from_secs(config.probe_interval_secs),
        )
    }

    /// One connection attempt; does not publish
    pub async fn probe_once(&self) -> bool {
        matches!(
            tokio::time::timeout(
                self.timeout,
                TcpStream::connect((self.host.as_str(), self.port))
            )
            .await,
            Ok(Ok(_))
        )
    }

    /// Probes every `interval` until `shutdown`, publishing transitions
    pub fn spawn_monitor(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                host = %self.host,
                port = self.port,
                interval_secs = self.interval.as_secs(),
                "Connectivity monitor starting"
            );
            let mut ticker = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = self.probe_once().await;
                        if publish_transition(&self.tx, online) {
                            info!(online, "Connectivity changed");
                        }
                    }
                }
            }

            debug!("Connectivity monitor stopped");
        })
    }
}

#[async_trait::async_trait]
impl IConnectivityProbe for TcpConnectivityProbe {
    async fn is_online(&self) -> bool {
        let online = self.probe_once().await;
        publish_transition(&self.tx, online);
        online
    }

    fn subscribe(&self) -> Option<watch::Receiver<bool>> {
        Some(self.tx.subscribe())
    }
}

// ============================================================================
// ConnectivityWatcher
// ============================================================================

/// Forwards probe transitions to a coordinator
pub struct ConnectivityWatcher {
    coordinator: Arc<SyncCoordinator>,
    reconnect_trigger: Option<SyncTrigger>,
}

impl ConnectivityWatcher {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            coordinator,
            reconnect_trigger: None,
        }
    }

    /// Requests a sync through `trigger` whenever connectivity comes back
    pub fn with_sync_on_reconnect(mut self, trigger: SyncTrigger) -> Self {
        self.reconnect_trigger = Some(trigger);
        self
    }

    /// Consumes transitions until `shutdown` or until the probe goes away
    pub async fn run(self, mut transitions: watch::Receiver<bool>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = transitions.changed() => {
                    if changed.is_err() {
                        debug!("Connectivity source closed");
                        break;
                    }
                    let online = *transitions.borrow_and_update();
                    if let Err(e) = self.coordinator.handle_connectivity_change(online).await {
                        warn!(online, error = %e, "Connectivity change not persisted");
                    }
                    if online {
                        if let Some(trigger) = &self.reconnect_trigger {
                            trigger.request_sync();
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_connectivity_publishes_changes_only() {
        let probe = StaticConnectivity::new(true);
        let mut rx = probe.subscribe().unwrap();

        probe.set_online(true);
        assert!(!rx.has_changed().unwrap());

        probe.set_online(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert!(!probe.is_online().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpConnectivityProbe::new(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_secs(10),
        );
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_reports_refused_port_offline() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpConnectivityProbe::new(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_secs(10),
        );
        let mut rx = probe.subscribe().unwrap();

        assert!(!probe.is_online().await);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }

    #[test]
    fn test_from_config() {
        let config = ConnectivityConfig::default();
        let probe = TcpConnectivityProbe::from_config(&config);
        assert_eq!(probe.host, "1.1.1.1");
        assert_eq!(probe.port, 443);
        assert_eq!(probe.timeout, Duration::from_millis(2000));
        assert_eq!(probe.interval, Duration::from_secs(10));
    }
}
