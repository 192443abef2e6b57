//! RenewalSweeper - background service driving time-based transitions.
//!
//! Subscriptions do not act on their own when a billing date or grace
//! deadline passes; the sweeper scans for them on an interval and pushes
//! each one through the lifecycle engine:
//! 1. Renewal pass: trials converting, periods rolling over, grace
//!    retries, scheduled cancellations finalizing.
//! 2. Expiry pass: grace windows that closed without a successful retry.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `sweep_interval` | 1h | How often to scan for due subscriptions |
//! | `batch_size` | 100 | Max subscriptions per pass per sweep |
//!
//! ## Graceful Shutdown
//!
//! The service listens for a shutdown signal and completes one final
//! sweep before stopping. Sweeps are idempotent, so an interrupted pass
//! is simply picked up by the next run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info};

use crate::application::lifecycle::{RenewalOutcome, SubscriptionLifecycleManager};
use crate::domain::foundation::Timestamp;
use crate::ports::SubscriptionStore;

/// Configuration for the renewal sweeper.
#[derive(Debug, Clone)]
pub struct RenewalSweeperConfig {
    /// How often to scan for due subscriptions.
    pub sweep_interval: Duration,

    /// Maximum subscriptions per pass per sweep.
    pub batch_size: u32,
}

impl Default for RenewalSweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            batch_size: 100,
        }
    }
}

impl RenewalSweeperConfig {
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }
}

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due subscriptions pushed through the engine.
    pub scanned: usize,
    pub renewed: usize,
    pub entered_grace: usize,
    pub still_in_grace: usize,
    pub cancellations_finalized: usize,
    pub expired: usize,

    /// Items or scans that errored. Each is logged and skipped.
    pub failures: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: RenewalOutcome) {
        match outcome {
            RenewalOutcome::Renewed => self.renewed += 1,
            RenewalOutcome::NotDue => {}
            RenewalOutcome::CancellationFinalized => self.cancellations_finalized += 1,
            RenewalOutcome::EnteredGrace => self.entered_grace += 1,
            RenewalOutcome::StillInGrace => self.still_in_grace += 1,
            RenewalOutcome::Expired => self.expired += 1,
        }
    }

    fn is_empty(&self) -> bool {
        self.scanned == 0 && self.failures == 0
    }
}

/// Background service that renews and expires due subscriptions.
///
/// Scans through the store port and acts through the lifecycle engine,
/// so everything it does carries the same locking, idempotent charging,
/// and notification behavior as a user-initiated operation.
pub struct RenewalSweeper {
    store: Arc<dyn SubscriptionStore>,
    manager: Arc<SubscriptionLifecycleManager>,
    config: RenewalSweeperConfig,
}

impl RenewalSweeper {
    /// Create a sweeper with default configuration.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        manager: Arc<SubscriptionLifecycleManager>,
    ) -> Self {
        Self::with_config(store, manager, RenewalSweeperConfig::default())
    }

    /// Create a sweeper with custom configuration.
    pub fn with_config(
        store: Arc<dyn SubscriptionStore>,
        manager: Arc<SubscriptionLifecycleManager>,
        config: RenewalSweeperConfig,
    ) -> Self {
        Self {
            store,
            manager,
            config,
        }
    }

    /// Run the sweep loop until the shutdown signal flips to `true`.
    ///
    /// Scan or per-item failures never stop the loop; they are logged and
    /// retried on the next interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.sweep_interval);
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            batch_size = self.config.batch_size,
            "renewal sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        // One final sweep so nothing due sits until restart.
                        self.log_pass(self.sweep_once(Timestamp::now()).await);
                        info!("renewal sweeper stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.log_pass(self.sweep_once(Timestamp::now()).await);
                }
            }
        }
    }

    /// Run one full sweep: a renewal pass, then an expiry pass.
    ///
    /// Takes `now` explicitly so tests can sweep any instant.
    pub async fn sweep_once(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();

        match self
            .store
            .find_due_for_renewal(now, self.config.batch_size)
            .await
        {
            Ok(due) => {
                for id in due {
                    report.scanned += 1;
                    match self.manager.renew(id, now).await {
                        Ok(outcome) => report.record(outcome),
                        Err(err) => {
                            report.failures += 1;
                            error!(subscription_id = %id, error = %err, "renewal sweep item failed");
                        }
                    }
                }
            }
            Err(err) => {
                report.failures += 1;
                error!(error = %err, "renewal scan failed");
            }
        }

        match self
            .store
            .find_due_for_grace_expiry(now, self.config.batch_size)
            .await
        {
            Ok(lapsed) => {
                for id in lapsed {
                    report.scanned += 1;
                    match self.manager.expire(id, now).await {
                        Ok(_) => report.expired += 1,
                        Err(err) => {
                            report.failures += 1;
                            error!(subscription_id = %id, error = %err, "expiry sweep item failed");
                        }
                    }
                }
            }
            Err(err) => {
                report.failures += 1;
                error!(error = %err, "grace expiry scan failed");
            }
        }

        report
    }

    fn log_pass(&self, report: SweepReport) {
        if report.is_empty() {
            debug!("sweep pass found nothing due");
            return;
        }
        info!(
            scanned = report.scanned,
            renewed = report.renewed,
            entered_grace = report.entered_grace,
            still_in_grace = report.still_in_grace,
            cancellations_finalized = report.cancellations_finalized,
            expired = report.expired,
            failures = report.failures,
            "sweep pass completed"
        );
    }
}
