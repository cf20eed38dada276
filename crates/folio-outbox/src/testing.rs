//! Events, aggregates and handlers shared by this crate's unit tests.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use folio_core::aggregate::AggregateRoot;
use folio_core::clock::Clock;
use folio_core::error::DomainError;
use folio_core::event::{DomainEvent, EventMetadata};
use folio_core::outbox::OutboxEnvelope;
use folio_test_support::{FixedClock, InMemoryStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::EventCapture;
use crate::handler::EventHandler;
use crate::registry::EventTypeRegistry;
use crate::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

pub(crate) const CREATED: &str = "Created";
pub(crate) const RENAMED: &str = "Renamed";
pub(crate) const GAUGE_CALIBRATED: &str = "GaugeCalibrated";
pub(crate) const UNSERIALIZABLE: &str = "Unserializable";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum WidgetEventKind {
    Created { name: String },
    Renamed { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WidgetEvent {
    pub metadata: EventMetadata,
    pub kind: WidgetEventKind,
}

impl DomainEvent for WidgetEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            WidgetEventKind::Created { .. } => CREATED,
            WidgetEventKind::Renamed { .. } => RENAMED,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Widget {
    pub id: Uuid,
    pub name: String,
    #[serde(skip)]
    uncommitted_events: Vec<WidgetEvent>,
}

impl Widget {
    pub(crate) fn create(id: Uuid, name: &str, clock: &dyn Clock) -> Self {
        let mut widget = Self {
            id,
            name: name.to_owned(),
            uncommitted_events: Vec::new(),
        };
        widget.raise(
            CREATED,
            WidgetEventKind::Created {
                name: name.to_owned(),
            },
            clock,
        );
        widget
    }

    pub(crate) fn rename(&mut self, name: &str, clock: &dyn Clock) {
        name.clone_into(&mut self.name);
        self.raise(
            RENAMED,
            WidgetEventKind::Renamed {
                name: name.to_owned(),
            },
            clock,
        );
    }

    fn raise(&mut self, event_type: &str, kind: WidgetEventKind, clock: &dyn Clock) {
        self.uncommitted_events.push(WidgetEvent {
            metadata: EventMetadata::raise(event_type, self.id, Uuid::new_v4(), clock),
            kind,
        });
    }
}

impl AggregateRoot for Widget {
    type Event = WidgetEvent;

    const AGGREGATE_TYPE: &'static str = "widget";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GaugeCalibrated {
    pub metadata: EventMetadata,
    pub reading: i64,
}

impl DomainEvent for GaugeCalibrated {
    fn event_type(&self) -> &'static str {
        GAUGE_CALIBRATED
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Gauge {
    pub id: Uuid,
    pub reading: i64,
    #[serde(skip)]
    uncommitted_events: Vec<GaugeCalibrated>,
}

impl Gauge {
    pub(crate) fn calibrate(id: Uuid, reading: i64, clock: &dyn Clock) -> Self {
        Self {
            id,
            reading,
            uncommitted_events: vec![GaugeCalibrated {
                metadata: EventMetadata::raise(GAUGE_CALIBRATED, id, Uuid::new_v4(), clock),
                reading,
            }],
        }
    }
}

impl AggregateRoot for Gauge {
    type Event = GaugeCalibrated;

    const AGGREGATE_TYPE: &'static str = "gauge";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

/// An event whose payload refuses to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Unserializable {
    pub metadata: EventMetadata,
}

impl DomainEvent for Unserializable {
    fn event_type(&self) -> &'static str {
        UNSERIALIZABLE
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        Err(<serde_json::Error as serde::ser::Error>::custom(
            "payload is not serializable",
        ))
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Faulty {
    pub id: Uuid,
    #[serde(skip)]
    uncommitted_events: Vec<Unserializable>,
}

impl Faulty {
    pub(crate) fn new(id: Uuid, clock: &dyn Clock) -> Self {
        Self {
            id,
            uncommitted_events: vec![Unserializable {
                metadata: EventMetadata::raise(UNSERIALIZABLE, id, Uuid::new_v4(), clock),
            }],
        }
    }
}

impl AggregateRoot for Faulty {
    type Event = Unserializable;

    const AGGREGATE_TYPE: &'static str = "faulty";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

/// Counts how many times a widget name has been observed.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Tally {
    pub id: Uuid,
    pub count: u32,
    #[serde(skip)]
    uncommitted_events: Vec<WidgetEvent>,
}

impl AggregateRoot for Tally {
    type Event = WidgetEvent;

    const AGGREGATE_TYPE: &'static str = "tally";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

pub(crate) fn registry() -> EventTypeRegistry {
    let mut registry = EventTypeRegistry::new();
    registry
        .register::<WidgetEvent>(CREATED)
        .register::<WidgetEvent>(RENAMED)
        .register::<GaugeCalibrated>(GAUGE_CALIBRATED)
        .register::<Unserializable>(UNSERIALIZABLE);
    registry
}

pub(crate) fn capture() -> Arc<EventCapture> {
    Arc::new(EventCapture::new(Arc::new(registry())))
}

pub(crate) fn factory(store: &InMemoryStore) -> UnitOfWorkFactory {
    UnitOfWorkFactory::new(Arc::new(store.clone()), capture())
}

/// Builds an unprocessed `Created` envelope that occurred `offset_secs`
/// after the shared test instant.
pub(crate) fn created_envelope(name: &str, offset_secs: i64) -> OutboxEnvelope {
    let clock = FixedClock(FixedClock::default().0 + chrono::Duration::seconds(offset_secs));
    let mut widget = Widget::create(Uuid::new_v4(), name, &clock);
    let event = widget.take_uncommitted_events().remove(0);
    registry()
        .encode(&event)
        .expect("widget events are registered")
}

/// Succeeds after failing a fixed number of times; counts successes.
#[derive(Debug)]
pub(crate) struct FlakyHandler {
    name: &'static str,
    failures: u32,
    calls: Arc<AtomicU32>,
    successes: Arc<AtomicU32>,
}

impl FlakyHandler {
    pub(crate) fn new(name: &'static str, failures: u32) -> Self {
        Self {
            name,
            failures,
            calls: Arc::new(AtomicU32::new(0)),
            successes: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn reliable(name: &'static str) -> Self {
        Self::new(name, 0)
    }

    pub(crate) fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    pub(crate) fn successes(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.successes)
    }
}

#[async_trait]
impl EventHandler<WidgetEvent> for FlakyHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, _event: &WidgetEvent, _uow: &mut UnitOfWork) -> Result<(), DomainError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(DomainError::Infrastructure(format!(
                "transient failure {call}"
            )));
        }
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Increments a `Tally` aggregate through the unit of work, then optionally
/// fails after the write has been staged.
#[derive(Debug)]
pub(crate) struct TallyHandler {
    pub tally_id: Uuid,
    pub fail_after_write: bool,
}

#[async_trait]
impl EventHandler<WidgetEvent> for TallyHandler {
    fn name(&self) -> &'static str {
        "tests.tally"
    }

    async fn handle(&self, _event: &WidgetEvent, uow: &mut UnitOfWork) -> Result<(), DomainError> {
        let mut tally = uow
            .load::<Tally>(self.tally_id)
            .await?
            .unwrap_or_else(|| Tally {
                id: self.tally_id,
                ..Tally::default()
            });
        tally.count += 1;
        uow.save(&mut tally).await?;
        if self.fail_after_write {
            return Err(DomainError::Infrastructure("tally sink unavailable".into()));
        }
        Ok(())
    }
}
