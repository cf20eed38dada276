//! Domain events for the Catalog context.

use std::any::Any;

use folio_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tag for [`BookCreated`].
pub const BOOK_CREATED_EVENT_TYPE: &str = "catalog.book_created";
/// Event type tag for [`BookUpdated`].
pub const BOOK_UPDATED_EVENT_TYPE: &str = "catalog.book_updated";
/// Event type tag for [`BookViewed`].
pub const BOOK_VIEWED_EVENT_TYPE: &str = "catalog.book_viewed";
/// Event type tag for [`BookDeleted`].
pub const BOOK_DELETED_EVENT_TYPE: &str = "catalog.book_deleted";

/// Emitted when a book is added to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCreated {
    /// The book identifier.
    pub book_id: Uuid,
    /// The book's title.
    pub title: String,
}

/// Emitted when a book's details change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdated {
    /// The book identifier.
    pub book_id: Uuid,
    /// The new title.
    pub title: String,
    /// The new author.
    pub author: String,
    /// The new publication year.
    pub publication_year: i32,
}

/// Emitted each time a book's details are viewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookViewed {
    /// The book identifier.
    pub book_id: Uuid,
    /// The book's view count after this view.
    pub views_count: u32,
}

/// Emitted when a book is soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDeleted {
    /// The book identifier.
    pub book_id: Uuid,
}

/// Event payload variants for the Catalog context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEventKind {
    /// A book has been added.
    BookCreated(BookCreated),
    /// A book's details have changed.
    BookUpdated(BookUpdated),
    /// A book has been viewed.
    BookViewed(BookViewed),
    /// A book has been deleted.
    BookDeleted(BookDeleted),
}

/// Domain event envelope for the Catalog context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CatalogEventKind,
}

impl DomainEvent for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            CatalogEventKind::BookCreated(_) => BOOK_CREATED_EVENT_TYPE,
            CatalogEventKind::BookUpdated(_) => BOOK_UPDATED_EVENT_TYPE,
            CatalogEventKind::BookViewed(_) => BOOK_VIEWED_EVENT_TYPE,
            CatalogEventKind::BookDeleted(_) => BOOK_DELETED_EVENT_TYPE,
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
