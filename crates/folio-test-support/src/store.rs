//! Test stores: in-memory `TransactionalStore` implementations for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::error::DomainError;
use folio_core::ledger::{ConsumptionLedger, ConsumptionRecord};
use folio_core::outbox::{DeadLetter, OutboxEnvelope, OutboxRepository};
use folio_core::repository::{AggregateRecord, AggregateRepository};
use folio_core::store::{Transaction, TransactionalStore};
use uuid::Uuid;

type AggregateKey = (String, Uuid);

#[derive(Debug, Clone, Default)]
struct StoreState {
    aggregates: HashMap<AggregateKey, AggregateRecord>,
    envelopes: Vec<OutboxEnvelope>,
    consumptions: HashSet<ConsumptionRecord>,
    dead_letters: Vec<DeadLetter>,
}

#[derive(Debug, Default)]
struct Faults {
    failing_begins: usize,
    failing_commits: usize,
    failing_rollbacks: usize,
}

/// A transactional store held in memory.
///
/// Each transaction buffers its writes and applies them under one lock on
/// commit, so a rolled back or dropped transaction leaves no trace. Reads see
/// committed state plus the transaction's own writes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an envelope directly, bypassing any transaction.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed_envelope(&self, envelope: OutboxEnvelope) {
        self.state.lock().unwrap().envelopes.push(envelope);
    }

    /// Returns a snapshot of every committed envelope, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn envelopes(&self) -> Vec<OutboxEnvelope> {
        self.state.lock().unwrap().envelopes.clone()
    }

    /// Returns the committed envelope with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn envelope(&self, id: Uuid) -> Option<OutboxEnvelope> {
        self.state
            .lock()
            .unwrap()
            .envelopes
            .iter()
            .find(|envelope| envelope.id == id)
            .cloned()
    }

    /// Returns a snapshot of every committed consumption record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn consumptions(&self) -> Vec<ConsumptionRecord> {
        self.state
            .lock()
            .unwrap()
            .consumptions
            .iter()
            .cloned()
            .collect()
    }

    /// Returns a snapshot of every committed dead letter.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().unwrap().dead_letters.clone()
    }

    /// Returns the committed snapshot of an aggregate.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn aggregate(&self, aggregate_type: &str, aggregate_id: Uuid) -> Option<AggregateRecord> {
        self.state
            .lock()
            .unwrap()
            .aggregates
            .get(&(aggregate_type.to_owned(), aggregate_id))
            .cloned()
    }

    /// Make the next `count` calls to `begin` fail with an infrastructure
    /// error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_begins(&self, count: usize) {
        self.faults.lock().unwrap().failing_begins = count;
    }

    /// Make the next `count` commits fail with an infrastructure error. The
    /// failing transactions' writes are discarded.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_commits(&self, count: usize) {
        self.faults.lock().unwrap().failing_commits = count;
    }

    /// Make the next `count` rollbacks fail with an infrastructure error.
    /// The transactions' writes are discarded all the same.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_rollbacks(&self, count: usize) {
        self.faults.lock().unwrap().failing_rollbacks = count;
    }
}

fn take_fault(counter: &mut usize) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        if take_fault(&mut self.faults.lock().unwrap().failing_begins) {
            return Err(DomainError::Infrastructure("connection refused".into()));
        }
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            writes: StagedWrites::default(),
        }))
    }
}

#[derive(Debug, Default)]
struct StagedWrites {
    aggregates: Vec<(AggregateRecord, i64)>,
    envelopes: Vec<OutboxEnvelope>,
    completions: Vec<OutboxEnvelope>,
    consumptions: Vec<ConsumptionRecord>,
    dead_letters: Vec<DeadLetter>,
}

/// Transaction handed out by `InMemoryStore`.
#[derive(Debug)]
struct InMemoryTransaction {
    state: Arc<Mutex<StoreState>>,
    faults: Arc<Mutex<Faults>>,
    writes: StagedWrites,
}

impl InMemoryTransaction {
    fn visible_aggregate(&self, aggregate_type: &str, aggregate_id: Uuid) -> Option<AggregateRecord> {
        let staged = self
            .writes
            .aggregates
            .iter()
            .rev()
            .find(|(record, _)| {
                record.aggregate_type == aggregate_type && record.aggregate_id == aggregate_id
            })
            .map(|(record, _)| record.clone());
        staged.or_else(|| {
            self.state
                .lock()
                .unwrap()
                .aggregates
                .get(&(aggregate_type.to_owned(), aggregate_id))
                .cloned()
        })
    }
}

fn apply(state: &mut StoreState, writes: StagedWrites) -> Result<(), DomainError> {
    for (record, expected) in writes.aggregates {
        let key = (record.aggregate_type.clone(), record.aggregate_id);
        let actual = state.aggregates.get(&key).map_or(0, |current| current.version);
        if actual != expected {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: record.aggregate_id,
                expected,
                actual,
            });
        }
        state.aggregates.insert(key, record);
    }

    for envelope in writes.envelopes {
        if state.envelopes.iter().any(|existing| existing.id == envelope.id) {
            return Err(DomainError::Infrastructure(format!(
                "duplicate outbox envelope {}",
                envelope.id
            )));
        }
        state.envelopes.push(envelope);
    }

    for completed in writes.completions {
        if let Some(envelope) = state
            .envelopes
            .iter_mut()
            .find(|envelope| envelope.id == completed.id && envelope.processed_at.is_none())
        {
            envelope.processed_at = completed.processed_at;
            envelope.error = completed.error;
        }
    }

    for record in writes.consumptions {
        if !state.consumptions.insert(record.clone()) {
            return Err(DomainError::Infrastructure(format!(
                "duplicate consumption record ({}, {})",
                record.event_id, record.handler_name
            )));
        }
    }

    state.dead_letters.extend(writes.dead_letters);
    Ok(())
}

#[async_trait]
impl AggregateRepository for InMemoryTransaction {
    async fn load_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError> {
        Ok(self.visible_aggregate(aggregate_type, aggregate_id))
    }

    async fn save_aggregate(
        &mut self,
        record: AggregateRecord,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let actual = self
            .visible_aggregate(&record.aggregate_type, record.aggregate_id)
            .map_or(0, |current| current.version);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: record.aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        self.writes.aggregates.push((record, expected_version));
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for InMemoryTransaction {
    async fn insert_envelopes(&mut self, envelopes: &[OutboxEnvelope]) -> Result<(), DomainError> {
        self.writes.envelopes.extend_from_slice(envelopes);
        Ok(())
    }

    async fn fetch_unprocessed(&mut self, limit: usize) -> Result<Vec<OutboxEnvelope>, DomainError> {
        let mut pending: Vec<OutboxEnvelope> = {
            let state = self.state.lock().unwrap();
            state
                .envelopes
                .iter()
                .chain(self.writes.envelopes.iter())
                .filter(|envelope| envelope.processed_at.is_none())
                .cloned()
                .collect()
        };
        pending.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processed(&mut self, envelopes: &[OutboxEnvelope]) -> Result<(), DomainError> {
        self.writes.completions.extend_from_slice(envelopes);
        Ok(())
    }

    async fn insert_dead_letter(&mut self, dead_letter: &DeadLetter) -> Result<(), DomainError> {
        self.writes.dead_letters.push(dead_letter.clone());
        Ok(())
    }
}

#[async_trait]
impl ConsumptionLedger for InMemoryTransaction {
    async fn consumption_exists(
        &mut self,
        event_id: Uuid,
        handler_name: &str,
    ) -> Result<bool, DomainError> {
        let record = ConsumptionRecord::new(event_id, handler_name);
        if self.writes.consumptions.contains(&record) {
            return Ok(true);
        }
        Ok(self.state.lock().unwrap().consumptions.contains(&record))
    }

    async fn insert_consumption(&mut self, record: &ConsumptionRecord) -> Result<(), DomainError> {
        if self
            .consumption_exists(record.event_id, &record.handler_name)
            .await?
        {
            return Err(DomainError::Infrastructure(format!(
                "duplicate consumption record ({}, {})",
                record.event_id, record.handler_name
            )));
        }
        self.writes.consumptions.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let this = *self;
        if take_fault(&mut this.faults.lock().unwrap().failing_commits) {
            return Err(DomainError::Infrastructure("commit failed".into()));
        }
        let mut state = this.state.lock().unwrap();
        let mut next = state.clone();
        apply(&mut next, this.writes)?;
        *state = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        if take_fault(&mut self.faults.lock().unwrap().failing_rollbacks) {
            return Err(DomainError::Infrastructure("rollback failed".into()));
        }
        Ok(())
    }
}

/// A store whose transactions can never be opened. Useful for testing
/// infrastructure failure paths.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl TransactionalStore for FailingStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
