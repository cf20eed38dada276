//! Event type registry: the polymorphic codec for outbox content.
//!
//! Every envelope stores an explicit type tag next to its payload. The
//! registry maps each tag to a decode function for the concrete event type,
//! so read-back never depends on type metadata embedded in the payload.

use std::collections::HashMap;

use folio_core::error::DomainError;
use folio_core::event::DomainEvent;
use folio_core::outbox::OutboxEnvelope;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::OutboxError;

type DecodeFn = fn(serde_json::Value) -> Result<Box<dyn DomainEvent>, serde_json::Error>;

fn decode_as<E>(data: serde_json::Value) -> Result<Box<dyn DomainEvent>, serde_json::Error>
where
    E: DomainEvent + DeserializeOwned,
{
    let event: E = serde_json::from_value(data)?;
    Ok(Box::new(event))
}

/// Shape of `OutboxEnvelope::content`.
#[derive(Debug, Serialize, Deserialize)]
struct TaggedContent {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

/// Maps event type tags to decoders for their concrete event types.
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `E` as the concrete type behind `event_type`, replacing any
    /// earlier registration for the same tag.
    pub fn register<E>(&mut self, event_type: &'static str) -> &mut Self
    where
        E: DomainEvent + DeserializeOwned,
    {
        self.decoders.insert(event_type, decode_as::<E>);
        self
    }

    /// Returns `true` if the tag has a decoder.
    #[must_use]
    pub fn is_registered(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Serializes an event into a new, unprocessed envelope.
    ///
    /// The envelope id mirrors the event id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the event's tag is not
    /// registered (it could never be read back) or if the event cannot be
    /// serialized.
    pub fn encode(&self, event: &dyn DomainEvent) -> Result<OutboxEnvelope, DomainError> {
        let event_type = event.event_type();
        if !self.is_registered(event_type) {
            return Err(DomainError::Serialization(format!(
                "event type {event_type} is not registered"
            )));
        }
        let content = serde_json::to_value(TaggedContent {
            event_type: event_type.to_owned(),
            data: event.to_payload()?,
        })?;
        let metadata = event.metadata();
        Ok(OutboxEnvelope {
            id: metadata.event_id,
            event_type: event_type.to_owned(),
            content,
            occurred_at: metadata.occurred_at,
            processed_at: None,
            error: None,
        })
    }

    /// Reconstructs the concrete event stored in an envelope.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Decode` if the tag is unknown, the content is
    /// malformed, or the envelope tag, embedded tag, decoded event tag and
    /// event id do not all agree.
    pub fn decode(&self, envelope: &OutboxEnvelope) -> Result<Box<dyn DomainEvent>, OutboxError> {
        let fail = |reason: String| OutboxError::Decode {
            envelope_id: envelope.id,
            reason,
        };

        let decoder = self
            .decoders
            .get(envelope.event_type.as_str())
            .ok_or_else(|| fail(format!("unknown event type {}", envelope.event_type)))?;
        let tagged: TaggedContent =
            serde_json::from_value(envelope.content.clone()).map_err(|e| fail(e.to_string()))?;
        if tagged.event_type != envelope.event_type {
            return Err(fail(format!(
                "content is tagged {} but envelope is {}",
                tagged.event_type, envelope.event_type
            )));
        }

        let event = decoder(tagged.data).map_err(|e| fail(e.to_string()))?;
        if event.event_type() != envelope.event_type {
            return Err(fail(format!(
                "payload decodes as {} but envelope is {}",
                event.event_type(),
                envelope.event_type
            )));
        }
        if event.metadata().event_id != envelope.id {
            return Err(fail(format!(
                "payload carries event id {}",
                event.metadata().event_id
            )));
        }
        Ok(event)
    }
}
