//! Sync scheduler - decides when the coordinator should run a sync
//!
//! The [`SyncScheduler`] turns three kinds of triggers into calls to
//! [`SyncCoordinator::run_sync`]:
//!
//! ```text
//! interval tick ──(can_sync && backoff elapsed)──┐
//! SyncTrigger::request_sync() ───────────────────┼──→ run_sync()
//! connectivity restored (via ConnectivityWatcher)┘
//! ```
//!
//! Retrying is the scheduler's job, not the coordinator's: after consecutive
//! gateway failures the next periodic attempt waits for an exponential
//! backoff. Manual requests ignore the backoff. Requests that arrive while a
//! sync is running are coalesced into one follow-up attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::SyncError;

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff: `base * 2^(failures - 1)`, capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    /// Consecutive failures recorded since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next attempt, or `None` after a success
    pub fn delay(&self) -> Option<Duration> {
        if self.failures == 0 {
            return None;
        }
        let factor = 2u32.checked_pow(self.failures - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max))
    }

    /// Counts a failure and returns the delay it imposes
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay().unwrap_or(self.base)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

// ============================================================================
// SyncTrigger
// ============================================================================

/// Cloneable handle for requesting an immediate sync
#[derive(Clone)]
pub struct SyncTrigger {
    wakeup: Arc<Notify>,
}

impl SyncTrigger {
    /// Requests a sync as soon as the scheduler is free
    ///
    /// Several requests made before the scheduler wakes up result in a
    /// single attempt.
    pub fn request_sync(&self) {
        debug!("Sync requested");
        self.wakeup.notify_one();
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Drives periodic and on-demand syncs for one coordinator
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
    backoff: Backoff,
    wakeup: Arc<Notify>,
    retry_not_before: Option<Instant>,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `coordinator` - The coordinator whose queue is synced
    /// * `interval` - Time between periodic checks
    /// * `backoff` - Delay policy applied after gateway failures
    pub fn new(coordinator: Arc<SyncCoordinator>, interval: Duration, backoff: Backoff) -> Self {
        info!(
            interval_secs = interval.as_secs(),
            "Creating sync scheduler"
        );
        Self {
            coordinator,
            interval,
            backoff,
            wakeup: Arc::new(Notify::new()),
            retry_not_before: None,
        }
    }

    /// Handle for manual and reconnect-triggered syncs
    pub fn trigger(&self) -> SyncTrigger {
        SyncTrigger {
            wakeup: Arc::clone(&self.wakeup),
        }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Main loop; returns once `shutdown` is cancelled
    ///
    /// An attempt already in progress when shutdown is requested is allowed
    /// to finish; the gateway timeout bounds how long that takes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Sync scheduler starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let wakeup = Arc::clone(&self.wakeup);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = wakeup.notified() => {
                    let _ = self.attempt("manual").await;
                }

                _ = ticker.tick() => {
                    // Picks up writes queued by other processes since the last tick
                    if let Err(e) = self.coordinator.refresh_status().await {
                        warn!(error = %e, "Failed to refresh sync status");
                    }
                    if self.periodic_due() {
                        let _ = self.attempt("periodic").await;
                    }
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Whether a periodic tick should run a sync now
    fn periodic_due(&self) -> bool {
        if !self.coordinator.can_sync() {
            return false;
        }
        match self.retry_not_before {
            Some(at) if Instant::now() < at => {
                debug!(
                    remaining_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "Periodic sync deferred by backoff"
                );
                false
            }
            _ => true,
        }
    }

    /// Runs one sync and updates the backoff from its outcome
    pub async fn attempt(&mut self, reason: &str) -> Result<SyncReport, SyncError> {
        debug!(reason, "Starting scheduled sync");
        let result = self.coordinator.run_sync().await;

        match &result {
            Ok(report) => {
                if self.backoff.failures() > 0 {
                    info!(
                        failures = self.backoff.failures(),
                        "Sync recovered after failures"
                    );
                }
                self.backoff.reset();
                self.retry_not_before = None;
                debug!(reason, records = report.records_sent, "Scheduled sync finished");
            }
            Err(err) if err.is_expected() => {
                debug!(reason, outcome = %err, "Scheduled sync skipped");
            }
            Err(err) => {
                let delay = self.backoff.record_failure();
                self.retry_not_before = Some(Instant::now() + delay);
                warn!(
                    reason,
                    error = %err,
                    failures = self.backoff.failures(),
                    retry_in_secs = delay.as_secs(),
                    "Scheduled sync failed"
                );
            }
        }

        result
    }
}
