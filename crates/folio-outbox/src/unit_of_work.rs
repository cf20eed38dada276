//! Unit of work: one transaction spanning business writes and the outbox.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use folio_core::aggregate::{AggregateRoot, EventSource};
use folio_core::error::DomainError;
use folio_core::ledger::ConsumptionRecord;
use folio_core::outbox::OutboxEnvelope;
use folio_core::repository::AggregateRecord;
use folio_core::store::{Transaction, TransactionalStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capture::EventCapture;

/// Opens units of work against a store.
#[derive(Clone)]
pub struct UnitOfWorkFactory {
    store: Arc<dyn TransactionalStore>,
    capture: Arc<EventCapture>,
}

impl fmt::Debug for UnitOfWorkFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWorkFactory").finish_non_exhaustive()
    }
}

impl UnitOfWorkFactory {
    /// Creates a factory whose units of work capture events with `capture`.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>, capture: Arc<EventCapture>) -> Self {
        Self { store, capture }
    }

    /// Opens a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot open a
    /// transaction.
    pub async fn begin(&self) -> Result<UnitOfWork, DomainError> {
        let tx = self.store.begin().await?;
        Ok(UnitOfWork {
            tx,
            capture: Arc::clone(&self.capture),
            versions: HashMap::new(),
            staged: Vec::new(),
            poisoned: None,
        })
    }
}

/// A single store transaction with event capture attached.
///
/// Saving an aggregate drains its pending events into envelopes; `commit`
/// writes those envelopes alongside the aggregate snapshots. If any save
/// fails the unit of work is poisoned and `commit` rolls back instead.
/// Dropping a unit of work without committing discards everything.
pub struct UnitOfWork {
    tx: Box<dyn Transaction>,
    capture: Arc<EventCapture>,
    versions: HashMap<(&'static str, Uuid), i64>,
    staged: Vec<OutboxEnvelope>,
    poisoned: Option<String>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("versions", &self.versions)
            .field("staged", &self.staged.len())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    /// Loads an aggregate snapshot, remembering its version for the next
    /// save.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the stored state does not
    /// deserialize as `A`, or `DomainError::Infrastructure` on store failure.
    pub async fn load<A>(&mut self, aggregate_id: Uuid) -> Result<Option<A>, DomainError>
    where
        A: AggregateRoot + DeserializeOwned,
    {
        let Some(record) = self
            .tx
            .load_aggregate(A::AGGREGATE_TYPE, aggregate_id)
            .await?
        else {
            return Ok(None);
        };
        let aggregate = serde_json::from_value(record.state)?;
        self.versions
            .insert((A::AGGREGATE_TYPE, aggregate_id), record.version);
        Ok(Some(aggregate))
    }

    /// Like [`UnitOfWork::load`], but a missing aggregate is an error.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if no snapshot exists.
    pub async fn get<A>(&mut self, aggregate_id: Uuid) -> Result<A, DomainError>
    where
        A: AggregateRoot + DeserializeOwned,
    {
        self.load(aggregate_id)
            .await?
            .ok_or(DomainError::AggregateNotFound(aggregate_id))
    }

    /// Writes the aggregate's snapshot, then captures its pending events.
    ///
    /// The snapshot is written with the version last seen by this unit of
    /// work (0 if the aggregate was never loaded), so a concurrent writer
    /// surfaces as `DomainError::ConcurrencyConflict`.
    ///
    /// # Errors
    ///
    /// Returns the capture, serialization or store error. Any error poisons
    /// the unit of work.
    pub async fn save<A>(&mut self, aggregate: &mut A) -> Result<(), DomainError>
    where
        A: AggregateRoot + Serialize,
    {
        if let Some(reason) = &self.poisoned {
            return Err(aborted(reason));
        }
        let result = self.persist(aggregate).await;
        if let Err(error) = &result {
            warn!(
                aggregate_type = A::AGGREGATE_TYPE,
                error = %error,
                "save failed, unit of work will roll back"
            );
            self.poisoned = Some(error.to_string());
        }
        result
    }

    async fn persist<A>(&mut self, aggregate: &mut A) -> Result<(), DomainError>
    where
        A: AggregateRoot + Serialize,
    {
        let aggregate_id = aggregate.aggregate_id();
        let key = (A::AGGREGATE_TYPE, aggregate_id);
        let expected = self.versions.get(&key).copied().unwrap_or(0);

        let record = AggregateRecord {
            aggregate_id,
            aggregate_type: A::AGGREGATE_TYPE.to_owned(),
            version: expected + 1,
            state: serde_json::to_value(&*aggregate)?,
        };
        self.tx.save_aggregate(record, expected).await?;

        // Events are only drained once the snapshot write has been accepted.
        let envelopes = self
            .capture
            .capture(&mut [&mut *aggregate as &mut dyn EventSource])?;
        self.versions.insert(key, expected + 1);
        self.staged.extend(envelopes);
        Ok(())
    }

    /// Envelopes captured so far that `commit` will write.
    #[must_use]
    pub fn pending_envelopes(&self) -> &[OutboxEnvelope] {
        &self.staged
    }

    /// Writes the captured envelopes and commits the transaction.
    ///
    /// Returns the envelopes that were committed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the unit of work was poisoned
    /// by a failed save (the transaction is rolled back), or the store's
    /// error if the insert or commit fails.
    pub async fn commit(mut self) -> Result<Vec<OutboxEnvelope>, DomainError> {
        if let Some(reason) = self.poisoned.take() {
            self.tx.rollback().await?;
            return Err(aborted(&reason));
        }
        if !self.staged.is_empty() {
            self.tx.insert_envelopes(&self.staged).await?;
        }
        self.tx.commit().await?;
        debug!(envelopes = self.staged.len(), "unit of work committed");
        Ok(self.staged)
    }

    /// Discards every write made through this unit of work.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the rollback itself fails.
    pub async fn rollback(self) -> Result<(), DomainError> {
        self.tx.rollback().await
    }

    pub(crate) async fn has_consumed(
        &mut self,
        event_id: Uuid,
        handler_name: &str,
    ) -> Result<bool, DomainError> {
        self.tx.consumption_exists(event_id, handler_name).await
    }

    pub(crate) async fn record_consumption(
        &mut self,
        record: &ConsumptionRecord,
    ) -> Result<(), DomainError> {
        self.tx.insert_consumption(record).await
    }
}

fn aborted(reason: &str) -> DomainError {
    DomainError::Infrastructure(format!("unit of work aborted after failed save: {reason}"))
}
