//! Outbox dispatcher: drains unprocessed envelopes in bounded batches.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use folio_core::clock::Clock;
use folio_core::error::DomainError;
use folio_core::event::DomainEvent;
use folio_core::outbox::{DeadLetter, OutboxEnvelope};
use folio_core::store::TransactionalStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::bus::EventBus;
use crate::error::OutboxError;
use crate::registry::EventTypeRegistry;
use crate::retry::RetryPolicy;
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL_SECS};

/// What happens to an envelope whose publication failed every attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalFailurePolicy {
    /// Mark it processed with the error text; it is never retried.
    #[default]
    MarkProcessed,
    /// As `MarkProcessed`, and also record a dead letter for inspection.
    DeadLetter,
}

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum envelopes read per run.
    pub batch_size: usize,
    /// Interval between scheduled runs.
    pub poll_interval: Duration,
    /// Retry policy for each envelope's publication.
    pub retry: RetryPolicy,
    /// Handling of envelopes that exhaust their retries.
    pub failure_policy: TerminalFailurePolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            retry: RetryPolicy::default(),
            failure_policy: TerminalFailurePolicy::default(),
        }
    }
}

/// Counts for a single dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Envelopes read from the store.
    pub fetched: usize,
    /// Envelopes whose publication succeeded.
    pub published: usize,
    /// Envelopes whose publication failed every attempt.
    pub failed: usize,
    /// Envelopes whose content could not be decoded.
    pub undecodable: usize,
    /// `true` if the run stopped early on cancellation.
    pub cancelled: bool,
}

impl RunReport {
    /// Envelopes that were marked processed by this run.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.published + self.failed + self.undecodable
    }
}

/// Result of asking the dispatcher to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run went ahead.
    Completed(RunReport),
    /// Another run was still in progress, so this one did nothing.
    Skipped,
}

/// Publishes outbox envelopes to the event bus.
///
/// Runs never overlap: a run requested while another is active returns
/// [`RunOutcome::Skipped`] immediately.
pub struct OutboxDispatcher {
    store: Arc<dyn TransactionalStore>,
    registry: Arc<EventTypeRegistry>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    running: Mutex<()>,
}

impl fmt::Debug for OutboxDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboxDispatcher")
            .field("bus", &self.bus)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OutboxDispatcher {
    /// Creates a dispatcher that reads from `store`, decodes with `registry`
    /// and publishes to `bus`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        registry: Arc<EventTypeRegistry>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
            clock,
            config,
            running: Mutex::new(()),
        }
    }

    /// Returns the dispatcher's configuration.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Runs one dispatch pass over the oldest unprocessed envelopes.
    ///
    /// Each envelope is decoded and published with retries, then marked
    /// processed whether or not publication succeeded. Completions are
    /// persisted in one transaction at the end of the run. Cancellation is
    /// checked before each envelope; envelopes not reached stay unprocessed.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Store` if the batch cannot be read or the
    /// completions cannot be persisted. In the latter case every envelope in
    /// the batch stays unprocessed and will be delivered again; the
    /// consumption ledger keeps handlers from acting twice.
    #[instrument(skip_all, name = "outbox_dispatch")]
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunOutcome, OutboxError> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("previous dispatch still running, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let mut batch = self.fetch_batch().await?;
        let mut report = RunReport {
            fetched: batch.len(),
            ..RunReport::default()
        };
        let mut dead_letters = Vec::new();

        for envelope in &mut batch {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let error = match self.registry.decode(envelope) {
                Ok(event) => match self.publish_with_retry(event.as_ref()).await {
                    Ok(()) => {
                        report.published += 1;
                        None
                    }
                    Err(error) => {
                        report.failed += 1;
                        warn!(envelope_id = %envelope.id, error = %error, "publication failed");
                        Some(error.to_string())
                    }
                },
                Err(error) => {
                    report.undecodable += 1;
                    warn!(envelope_id = %envelope.id, error = %error, "undecodable envelope");
                    Some(error.to_string())
                }
            };

            let now = self.clock.now();
            if let Some(error) = &error {
                if self.config.failure_policy == TerminalFailurePolicy::DeadLetter {
                    dead_letters.push(DeadLetter {
                        envelope_id: envelope.id,
                        event_type: envelope.event_type.clone(),
                        error: error.clone(),
                        failed_at: now,
                    });
                }
            }
            envelope.complete(now, error)?;
        }

        batch.truncate(report.completed());
        if !batch.is_empty() {
            self.persist(&batch, &dead_letters).await?;
        }

        info!(
            fetched = report.fetched,
            published = report.published,
            failed = report.failed,
            undecodable = report.undecodable,
            cancelled = report.cancelled,
            "outbox dispatch finished"
        );
        Ok(RunOutcome::Completed(report))
    }

    async fn fetch_batch(&self) -> Result<Vec<OutboxEnvelope>, DomainError> {
        let mut tx = self.store.begin().await?;
        let batch = tx.fetch_unprocessed(self.config.batch_size).await?;
        tx.rollback().await?;
        Ok(batch)
    }

    async fn publish_with_retry(&self, event: &dyn DomainEvent) -> Result<(), OutboxError> {
        let bus: &EventBus = &self.bus;
        self.config
            .retry
            .run(move |_| bus.publish(event))
            .await
    }

    async fn persist(
        &self,
        completed: &[OutboxEnvelope],
        dead_letters: &[DeadLetter],
    ) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        tx.mark_processed(completed).await?;
        for dead_letter in dead_letters {
            tx.insert_dead_letter(dead_letter).await?;
        }
        tx.commit().await
    }
}
