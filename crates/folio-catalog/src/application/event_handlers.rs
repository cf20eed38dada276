//! Event handlers for the Catalog context.
//!
//! These keep the `CatalogSummary` read model in step with book events. They
//! are registered behind the idempotent consumer wrapper, so a redelivered
//! event never counts twice.

use async_trait::async_trait;
use folio_core::error::DomainError;
use folio_core::event::DomainEvent;
use folio_outbox::handler::EventHandler;
use folio_outbox::unit_of_work::UnitOfWork;

use crate::domain::aggregates::{CATALOG_SUMMARY_ID, CatalogSummary};
use crate::domain::events::{CatalogEvent, CatalogEventKind};

async fn update_summary(
    uow: &mut UnitOfWork,
    update: impl FnOnce(&mut CatalogSummary) + Send,
) -> Result<(), DomainError> {
    let mut summary = uow
        .load::<CatalogSummary>(CATALOG_SUMMARY_ID)
        .await?
        .unwrap_or_default();
    update(&mut summary);
    uow.save(&mut summary).await
}

fn unexpected(handler: &str, event: &CatalogEvent) -> DomainError {
    DomainError::Validation(format!(
        "{handler} cannot handle {}",
        event.event_type()
    ))
}

/// Counts each created book.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryOnBookCreated;

#[async_trait]
impl EventHandler<CatalogEvent> for SummaryOnBookCreated {
    fn name(&self) -> &'static str {
        "catalog.summary.on_book_created"
    }

    async fn handle(&self, event: &CatalogEvent, uow: &mut UnitOfWork) -> Result<(), DomainError> {
        let CatalogEventKind::BookCreated(_) = &event.kind else {
            return Err(unexpected(self.name(), event));
        };
        update_summary(uow, CatalogSummary::record_book_added).await
    }
}

/// Uncounts each deleted book.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryOnBookDeleted;

#[async_trait]
impl EventHandler<CatalogEvent> for SummaryOnBookDeleted {
    fn name(&self) -> &'static str {
        "catalog.summary.on_book_deleted"
    }

    async fn handle(&self, event: &CatalogEvent, uow: &mut UnitOfWork) -> Result<(), DomainError> {
        let CatalogEventKind::BookDeleted(_) = &event.kind else {
            return Err(unexpected(self.name(), event));
        };
        update_summary(uow, CatalogSummary::record_book_removed).await
    }
}

/// Adds each view to the catalog-wide total.
///
/// Increments by one per event rather than copying the book's count, which
/// is only correct because deliveries are deduplicated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryOnBookViewed;

#[async_trait]
impl EventHandler<CatalogEvent> for SummaryOnBookViewed {
    fn name(&self) -> &'static str {
        "catalog.summary.on_book_viewed"
    }

    async fn handle(&self, event: &CatalogEvent, uow: &mut UnitOfWork) -> Result<(), DomainError> {
        let CatalogEventKind::BookViewed(_) = &event.kind else {
            return Err(unexpected(self.name(), event));
        };
        update_summary(uow, CatalogSummary::record_view).await
    }
}
