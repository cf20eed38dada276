//! Command handlers for the Catalog context.
//!
//! Each handler runs in one unit of work: load the aggregate, execute the
//! command, save. The events the command raises are written to the outbox
//! in the same commit as the new book state.

use folio_core::clock::Clock;
use folio_core::command::Command;
use folio_core::error::DomainError;
use folio_core::outbox::OutboxEnvelope;
use folio_outbox::unit_of_work::UnitOfWorkFactory;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::Book;
use crate::domain::commands::{
    AddBook, AddBooksBulk, DeleteBook, SoftDeleteBooksBulk, UpdateBook, ViewBook,
};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct CatalogCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// The outbox envelopes committed with the change.
    pub envelopes: Vec<OutboxEnvelope>,
}

/// Handles the `AddBook` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if a book with the same id exists or the
/// details are invalid, or the store's error if persisting fails.
#[instrument(skip_all, fields(command = command.command_type(), book_id = %command.book_id))]
pub async fn handle_add_book(
    command: &AddBook,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<CatalogCommandResult, DomainError> {
    let mut uow = uow_factory.begin().await?;
    if uow.load::<Book>(command.book_id).await?.is_some() {
        return Err(DomainError::Validation(format!(
            "book {} already exists",
            command.book_id
        )));
    }

    let mut book = Book::create(
        command.book_id,
        &command.title,
        &command.author,
        command.publication_year,
        command.correlation_id(),
        clock,
    )?;
    uow.save(&mut book).await?;
    let envelopes = uow.commit().await?;

    info!(title = %book.title, "book added");
    Ok(CatalogCommandResult {
        aggregate_id: command.book_id,
        envelopes,
    })
}

/// Handles the `UpdateBook` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the book does not exist,
/// `DomainError::Validation` if it is deleted or the details are invalid.
#[instrument(skip_all, fields(command = command.command_type(), book_id = %command.book_id))]
pub async fn handle_update_book(
    command: &UpdateBook,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<CatalogCommandResult, DomainError> {
    let mut uow = uow_factory.begin().await?;
    let mut book = uow.get::<Book>(command.book_id).await?;

    book.update_details(
        &command.title,
        &command.author,
        command.publication_year,
        command.correlation_id(),
        clock,
    )?;
    uow.save(&mut book).await?;
    let envelopes = uow.commit().await?;

    Ok(CatalogCommandResult {
        aggregate_id: command.book_id,
        envelopes,
    })
}

/// Handles the `ViewBook` command, returning the updated book.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the book does not exist or
/// `DomainError::Validation` if it is deleted.
#[instrument(skip_all, fields(command = command.command_type(), book_id = %command.book_id))]
pub async fn handle_view_book(
    command: &ViewBook,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<Book, DomainError> {
    let mut uow = uow_factory.begin().await?;
    let mut book = uow.get::<Book>(command.book_id).await?;

    book.add_view(command.correlation_id(), clock)?;
    uow.save(&mut book).await?;
    uow.commit().await?;

    Ok(book)
}

/// Handles the `DeleteBook` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the book does not exist or
/// `DomainError::Validation` if it is already deleted.
#[instrument(skip_all, fields(command = command.command_type(), book_id = %command.book_id))]
pub async fn handle_delete_book(
    command: &DeleteBook,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<CatalogCommandResult, DomainError> {
    let mut uow = uow_factory.begin().await?;
    let mut book = uow.get::<Book>(command.book_id).await?;

    book.soft_delete(command.correlation_id(), clock)?;
    uow.save(&mut book).await?;
    let envelopes = uow.commit().await?;

    info!("book deleted");
    Ok(CatalogCommandResult {
        aggregate_id: command.book_id,
        envelopes,
    })
}

/// Result of a successfully handled bulk command.
#[derive(Debug)]
pub struct CatalogBulkResult {
    /// The books affected, in command order.
    pub aggregate_ids: Vec<Uuid>,
    /// The outbox envelopes committed with the change.
    pub envelopes: Vec<OutboxEnvelope>,
}

/// Handles the `AddBooksBulk` command in a single unit of work.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the list is empty, any id is taken
/// (including twice in the same list) or any book's details are invalid.
/// Nothing is written in that case.
#[instrument(skip_all, fields(command = command.command_type(), books = command.books.len()))]
pub async fn handle_add_books_bulk(
    command: &AddBooksBulk,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<CatalogBulkResult, DomainError> {
    if command.books.is_empty() {
        return Err(DomainError::Validation("books must not be empty".into()));
    }

    let mut uow = uow_factory.begin().await?;
    for new_book in &command.books {
        if uow.load::<Book>(new_book.book_id).await?.is_some() {
            return Err(DomainError::Validation(format!(
                "book {} already exists",
                new_book.book_id
            )));
        }
        let mut book = Book::create(
            new_book.book_id,
            &new_book.title,
            &new_book.author,
            new_book.publication_year,
            command.correlation_id(),
            clock,
        )?;
        uow.save(&mut book).await?;
    }
    let envelopes = uow.commit().await?;

    info!(count = command.books.len(), "books added");
    Ok(CatalogBulkResult {
        aggregate_ids: command.books.iter().map(|b| b.book_id).collect(),
        envelopes,
    })
}

/// Handles the `SoftDeleteBooksBulk` command in a single unit of work.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the list is empty or any book is
/// already deleted, and `DomainError::AggregateNotFound` if any book is
/// missing. Nothing is written in either case.
#[instrument(skip_all, fields(command = command.command_type(), books = command.book_ids.len()))]
pub async fn handle_soft_delete_books_bulk(
    command: &SoftDeleteBooksBulk,
    clock: &dyn Clock,
    uow_factory: &UnitOfWorkFactory,
) -> Result<CatalogBulkResult, DomainError> {
    if command.book_ids.is_empty() {
        return Err(DomainError::Validation("book ids must not be empty".into()));
    }

    let mut uow = uow_factory.begin().await?;
    for &book_id in &command.book_ids {
        let mut book = uow.get::<Book>(book_id).await?;
        book.soft_delete(command.correlation_id(), clock)?;
        uow.save(&mut book).await?;
    }
    let envelopes = uow.commit().await?;

    info!(count = command.book_ids.len(), "books deleted");
    Ok(CatalogBulkResult {
        aggregate_ids: command.book_ids.clone(),
        envelopes,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_core::error::DomainError;
    use folio_outbox::capture::EventCapture;
    use folio_outbox::registry::EventTypeRegistry;
    use folio_outbox::unit_of_work::UnitOfWorkFactory;
    use folio_test_support::{FixedClock, InMemoryStore};
    use uuid::Uuid;

    use crate::application::command_handlers::{
        handle_add_book, handle_add_books_bulk, handle_delete_book,
        handle_soft_delete_books_bulk, handle_update_book, handle_view_book,
    };
    use crate::domain::commands::{
        AddBook, AddBooksBulk, DeleteBook, NewBook, SoftDeleteBooksBulk, UpdateBook, ViewBook,
    };
    use crate::domain::events::{
        BOOK_CREATED_EVENT_TYPE, BOOK_DELETED_EVENT_TYPE, BOOK_UPDATED_EVENT_TYPE,
        BOOK_VIEWED_EVENT_TYPE,
    };

    fn factory(store: &InMemoryStore) -> UnitOfWorkFactory {
        let mut registry = EventTypeRegistry::new();
        crate::register_event_types(&mut registry);
        UnitOfWorkFactory::new(
            Arc::new(store.clone()),
            Arc::new(EventCapture::new(Arc::new(registry))),
        )
    }

    fn add_dune(book_id: Uuid) -> AddBook {
        AddBook {
            correlation_id: Uuid::new_v4(),
            book_id,
            title: "Dune".to_owned(),
            author: "Frank Herbert".to_owned(),
            publication_year: 1965,
        }
    }

    #[tokio::test]
    async fn test_handle_add_book_commits_state_and_outbox_together() {
        // Arrange
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let command = add_dune(Uuid::new_v4());

        // Act
        let result = handle_add_book(&command, &clock, &factory(&store))
            .await
            .unwrap();

        // Assert
        assert_eq!(result.aggregate_id, command.book_id);
        assert_eq!(result.envelopes.len(), 1);
        assert_eq!(result.envelopes[0].event_type, BOOK_CREATED_EVENT_TYPE);
        assert_eq!(store.envelopes(), result.envelopes);
        let record = store.aggregate("book", command.book_id).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.state["title"], "Dune");
    }

    #[tokio::test]
    async fn test_handle_add_book_rejects_duplicate_id() {
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let factory = factory(&store);
        let command = add_dune(Uuid::new_v4());
        handle_add_book(&command, &clock, &factory).await.unwrap();

        let result = handle_add_book(&command, &clock, &factory).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.envelopes().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_command_writes_nothing() {
        let store = InMemoryStore::new();
        let mut command = add_dune(Uuid::new_v4());
        command.title = String::new();

        let result = handle_add_book(&command, &FixedClock::default(), &factory(&store)).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(store.envelopes().is_empty());
        assert!(store.aggregate("book", command.book_id).is_none());
    }

    #[tokio::test]
    async fn test_book_lifecycle_appends_one_envelope_per_command() {
        // Arrange
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let factory = factory(&store);
        let book_id = Uuid::new_v4();
        handle_add_book(&add_dune(book_id), &clock, &factory)
            .await
            .unwrap();

        // Act
        handle_update_book(
            &UpdateBook {
                correlation_id: Uuid::new_v4(),
                book_id,
                title: "Dune Messiah".to_owned(),
                author: "Frank Herbert".to_owned(),
                publication_year: 1969,
            },
            &clock,
            &factory,
        )
        .await
        .unwrap();
        let viewed = handle_view_book(
            &ViewBook {
                correlation_id: Uuid::new_v4(),
                book_id,
            },
            &clock,
            &factory,
        )
        .await
        .unwrap();
        handle_delete_book(
            &DeleteBook {
                correlation_id: Uuid::new_v4(),
                book_id,
            },
            &clock,
            &factory,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(viewed.views_count, 1);
        let types: Vec<String> = store.envelopes().into_iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                BOOK_CREATED_EVENT_TYPE,
                BOOK_UPDATED_EVENT_TYPE,
                BOOK_VIEWED_EVENT_TYPE,
                BOOK_DELETED_EVENT_TYPE,
            ]
        );
        let record = store.aggregate("book", book_id).unwrap();
        assert_eq!(record.version, 4);
        assert_eq!(record.state["is_deleted"], true);
    }

    fn new_book(title: &str, publication_year: i32) -> NewBook {
        NewBook {
            book_id: Uuid::new_v4(),
            title: title.to_owned(),
            author: "Frank Herbert".to_owned(),
            publication_year,
        }
    }

    #[tokio::test]
    async fn test_bulk_add_commits_every_book_together() {
        // Arrange
        let store = InMemoryStore::new();
        let command = AddBooksBulk {
            correlation_id: Uuid::new_v4(),
            books: vec![
                new_book("Dune", 1965),
                new_book("Dune Messiah", 1969),
                new_book("Children of Dune", 1976),
            ],
        };

        // Act
        let result = handle_add_books_bulk(&command, &FixedClock::default(), &factory(&store))
            .await
            .unwrap();

        // Assert
        assert_eq!(result.envelopes.len(), 3);
        assert_eq!(store.envelopes(), result.envelopes);
        for book in &command.books {
            assert_eq!(store.aggregate("book", book.book_id).unwrap().version, 1);
        }
        let aggregate_ids: Vec<Uuid> = command.books.iter().map(|b| b.book_id).collect();
        assert_eq!(result.aggregate_ids, aggregate_ids);
    }

    #[tokio::test]
    async fn test_bulk_add_with_one_invalid_book_writes_nothing() {
        // Arrange
        let store = InMemoryStore::new();
        let command = AddBooksBulk {
            correlation_id: Uuid::new_v4(),
            books: vec![new_book("Dune", 1965), new_book("", 1969)],
        };

        // Act
        let result = handle_add_books_bulk(&command, &FixedClock::default(), &factory(&store)).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(store.envelopes().is_empty());
        assert!(store.aggregate("book", command.books[0].book_id).is_none());
    }

    #[tokio::test]
    async fn test_bulk_add_rejects_repeated_id() {
        let store = InMemoryStore::new();
        let dune = new_book("Dune", 1965);
        let command = AddBooksBulk {
            correlation_id: Uuid::new_v4(),
            books: vec![dune.clone(), dune],
        };

        let result = handle_add_books_bulk(&command, &FixedClock::default(), &factory(&store)).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(store.envelopes().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_commands_reject_empty_lists() {
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let factory = factory(&store);

        let add = handle_add_books_bulk(
            &AddBooksBulk {
                correlation_id: Uuid::new_v4(),
                books: Vec::new(),
            },
            &clock,
            &factory,
        )
        .await;
        let delete = handle_soft_delete_books_bulk(
            &SoftDeleteBooksBulk {
                correlation_id: Uuid::new_v4(),
                book_ids: Vec::new(),
            },
            &clock,
            &factory,
        )
        .await;

        assert!(matches!(add, Err(DomainError::Validation(_))));
        assert!(matches!(delete, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_bulk_delete_commits_every_deletion_together() {
        // Arrange
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let factory = factory(&store);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        handle_add_book(&add_dune(first), &clock, &factory).await.unwrap();
        handle_add_book(&add_dune(second), &clock, &factory).await.unwrap();

        // Act
        let result = handle_soft_delete_books_bulk(
            &SoftDeleteBooksBulk {
                correlation_id: Uuid::new_v4(),
                book_ids: vec![first, second],
            },
            &clock,
            &factory,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.envelopes.len(), 2);
        assert!(
            result
                .envelopes
                .iter()
                .all(|e| e.event_type == BOOK_DELETED_EVENT_TYPE)
        );
        assert_eq!(store.aggregate("book", first).unwrap().state["is_deleted"], true);
        assert_eq!(store.aggregate("book", second).unwrap().state["is_deleted"], true);
    }

    #[tokio::test]
    async fn test_bulk_delete_with_missing_book_writes_nothing() {
        // Arrange
        let store = InMemoryStore::new();
        let clock = FixedClock::default();
        let factory = factory(&store);
        let existing = Uuid::new_v4();
        let missing = Uuid::new_v4();
        handle_add_book(&add_dune(existing), &clock, &factory)
            .await
            .unwrap();

        // Act
        let result = handle_soft_delete_books_bulk(
            &SoftDeleteBooksBulk {
                correlation_id: Uuid::new_v4(),
                book_ids: vec![existing, missing],
            },
            &clock,
            &factory,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::AggregateNotFound(id)) if id == missing));
        assert_eq!(store.envelopes().len(), 1);
        let record = store.aggregate("book", existing).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.state["is_deleted"], false);
    }

    #[tokio::test]
    async fn test_commands_on_unknown_book_are_not_found() {
        let store = InMemoryStore::new();
        let book_id = Uuid::new_v4();

        let result = handle_view_book(
            &ViewBook {
                correlation_id: Uuid::new_v4(),
                book_id,
            },
            &FixedClock::default(),
            &factory(&store),
        )
        .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(id)) if id == book_id));
    }
}
