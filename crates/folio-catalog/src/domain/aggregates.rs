//! Aggregate roots for the Catalog context.

use chrono::Datelike;
use folio_core::aggregate::AggregateRoot;
use folio_core::clock::Clock;
use folio_core::error::DomainError;
use folio_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    BOOK_CREATED_EVENT_TYPE, BOOK_DELETED_EVENT_TYPE, BOOK_UPDATED_EVENT_TYPE,
    BOOK_VIEWED_EVENT_TYPE, BookCreated, BookDeleted, BookUpdated, BookViewed, CatalogEvent,
    CatalogEventKind,
};

/// Longest accepted book title, in characters.
pub const TITLE_MAX_LENGTH: usize = 150;

/// Earliest accepted publication year.
pub const EARLIEST_PUBLICATION_YEAR: i32 = 1450;

/// Well-known identifier of the single catalog summary.
pub const CATALOG_SUMMARY_ID: Uuid = Uuid::from_u128(0x0196_0000_0000_7000_8000_0000_0000_0001);

fn validate_details(
    title: &str,
    author: &str,
    publication_year: i32,
    clock: &dyn Clock,
) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::Validation("title must not be empty".into()));
    }
    if title.chars().count() > TITLE_MAX_LENGTH {
        return Err(DomainError::Validation(format!(
            "title must be at most {TITLE_MAX_LENGTH} characters"
        )));
    }
    if author.trim().is_empty() {
        return Err(DomainError::Validation("author must not be empty".into()));
    }
    let current_year = clock.now().year();
    if !(EARLIEST_PUBLICATION_YEAR..=current_year).contains(&publication_year) {
        return Err(DomainError::Validation(format!(
            "publication year must be between {EARLIEST_PUBLICATION_YEAR} and {current_year}"
        )));
    }
    Ok(())
}

/// The aggregate root for a catalogued book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Year of publication.
    pub publication_year: i32,
    /// How many times the book's details have been viewed.
    pub views_count: u32,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Uncommitted events pending capture.
    #[serde(skip)]
    uncommitted_events: Vec<CatalogEvent>,
}

impl Book {
    /// Creates a new book, producing a `BookCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title or author is blank, the
    /// title is too long, or the publication year is out of range.
    pub fn create(
        id: Uuid,
        title: &str,
        author: &str,
        publication_year: i32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        validate_details(title, author, publication_year, clock)?;
        let mut book = Self {
            id,
            title: title.to_owned(),
            author: author.to_owned(),
            publication_year,
            views_count: 0,
            is_deleted: false,
            uncommitted_events: Vec::new(),
        };
        book.raise(
            BOOK_CREATED_EVENT_TYPE,
            CatalogEventKind::BookCreated(BookCreated {
                book_id: id,
                title: title.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(book)
    }

    /// Replaces the book's details, producing a `BookUpdated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the book is deleted or the new
    /// details are invalid.
    pub fn update_details(
        &mut self,
        title: &str,
        author: &str,
        publication_year: i32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        validate_details(title, author, publication_year, clock)?;
        title.clone_into(&mut self.title);
        author.clone_into(&mut self.author);
        self.publication_year = publication_year;
        self.raise(
            BOOK_UPDATED_EVENT_TYPE,
            CatalogEventKind::BookUpdated(BookUpdated {
                book_id: self.id,
                title: title.to_owned(),
                author: author.to_owned(),
                publication_year,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Counts a view of the book's details, producing a `BookViewed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the book is deleted.
    pub fn add_view(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        self.views_count = self.views_count.saturating_add(1);
        self.raise(
            BOOK_VIEWED_EVENT_TYPE,
            CatalogEventKind::BookViewed(BookViewed {
                book_id: self.id,
                views_count: self.views_count,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Soft-deletes the book, producing a `BookDeleted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the book is already deleted.
    pub fn soft_delete(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_not_deleted()?;
        self.is_deleted = true;
        self.raise(
            BOOK_DELETED_EVENT_TYPE,
            CatalogEventKind::BookDeleted(BookDeleted { book_id: self.id }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    fn ensure_not_deleted(&self) -> Result<(), DomainError> {
        if self.is_deleted {
            return Err(DomainError::Validation(format!(
                "book {} is deleted",
                self.id
            )));
        }
        Ok(())
    }

    fn raise(
        &mut self,
        event_type: &str,
        kind: CatalogEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        self.uncommitted_events.push(CatalogEvent {
            metadata: EventMetadata::raise(event_type, self.id, correlation_id, clock),
            kind,
        });
    }
}

impl AggregateRoot for Book {
    type Event = CatalogEvent;

    const AGGREGATE_TYPE: &'static str = "book";

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

/// Running totals over the whole catalog, kept up to date by event handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Aggregate identifier, always [`CATALOG_SUMMARY_ID`].
    pub id: Uuid,
    /// Books currently in the catalog.
    pub book_count: u64,
    /// Views across all books, deleted ones included.
    pub total_views: u64,
    #[serde(skip)]
    uncommitted_events: Vec<CatalogEvent>,
}

impl Default for CatalogSummary {
    fn default() -> Self {
        Self {
            id: CATALOG_SUMMARY_ID,
            book_count: 0,
            total_views: 0,
            uncommitted_events: Vec::new(),
        }
    }
}

impl CatalogSummary {
    /// Counts a newly added book.
    pub fn record_book_added(&mut self) {
        self.book_count = self.book_count.saturating_add(1);
    }

    /// Counts a removed book.
    pub fn record_book_removed(&mut self) {
        self.book_count = self.book_count.saturating_sub(1);
    }

    /// Counts a single view.
    pub fn record_view(&mut self) {
        self.total_views = self.total_views.saturating_add(1);
    }
}

impl AggregateRoot for CatalogSummary {
    type Event = CatalogEvent;

    const AGGREGATE_TYPE: &'static str = "catalog_summary";

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
