//! Periodic trigger for the outbox dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatcher::{OutboxDispatcher, RunOutcome};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs the dispatcher on a fixed interval until cancelled.
///
/// The first run starts immediately. Ticks that fall due while a run is
/// still in progress are dropped rather than queued.
#[derive(Debug, Clone)]
pub struct OutboxScheduler {
    dispatcher: Arc<OutboxDispatcher>,
    interval: Duration,
}

impl OutboxScheduler {
    /// Schedules `dispatcher` at its configured poll interval.
    #[must_use]
    pub fn new(dispatcher: Arc<OutboxDispatcher>) -> Self {
        let interval = dispatcher.config().poll_interval;
        Self::with_interval(dispatcher, interval)
    }

    /// Schedules `dispatcher` every `interval` (at least one millisecond).
    #[must_use]
    pub fn with_interval(dispatcher: Arc<OutboxDispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Runs the schedule on a background task.
    #[must_use]
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Runs the schedule on the current task until `cancel` fires.
    ///
    /// A run that is in progress when cancellation arrives stops before its
    /// next envelope. Failed runs are logged and the schedule continues.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_ms = self.interval_ms(), "outbox scheduler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.dispatcher.run_once(&cancel).await {
                Ok(RunOutcome::Completed(report)) => {
                    debug!(completed = report.completed(), "scheduled dispatch completed");
                }
                Ok(RunOutcome::Skipped) => debug!("scheduled dispatch skipped"),
                Err(err) => error!(error = %err, "scheduled dispatch failed"),
            }
        }

        info!("outbox scheduler stopped");
    }

    fn interval_ms(&self) -> u64 {
        u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX)
    }
}
