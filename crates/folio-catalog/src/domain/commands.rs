//! Commands for the Catalog context.

use folio_core::command::Command;
use uuid::Uuid;

/// Command to add a book to the catalog.
#[derive(Debug, Clone)]
pub struct AddBook {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The identifier for the new book.
    pub book_id: Uuid,
    /// The book's title.
    pub title: String,
    /// The book's author.
    pub author: String,
    /// The year the book was published.
    pub publication_year: i32,
}

/// Command to replace a book's details.
#[derive(Debug, Clone)]
pub struct UpdateBook {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The book identifier.
    pub book_id: Uuid,
    /// The new title.
    pub title: String,
    /// The new author.
    pub author: String,
    /// The new publication year.
    pub publication_year: i32,
}

/// Command to record that a book's details were viewed.
#[derive(Debug, Clone)]
pub struct ViewBook {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The book identifier.
    pub book_id: Uuid,
}

/// Command to soft-delete a book.
#[derive(Debug, Clone)]
pub struct DeleteBook {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The book identifier.
    pub book_id: Uuid,
}

/// One book in an [`AddBooksBulk`] command.
#[derive(Debug, Clone)]
pub struct NewBook {
    /// The identifier for the new book.
    pub book_id: Uuid,
    /// The book's title.
    pub title: String,
    /// The book's author.
    pub author: String,
    /// The year the book was published.
    pub publication_year: i32,
}

/// Command to add several books at once. Either every book is added or none.
#[derive(Debug, Clone)]
pub struct AddBooksBulk {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The books to add.
    pub books: Vec<NewBook>,
}

/// Command to soft-delete several books at once. Either every book is
/// deleted or none.
#[derive(Debug, Clone)]
pub struct SoftDeleteBooksBulk {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The books to delete.
    pub book_ids: Vec<Uuid>,
}

impl Command for AddBook {
    fn command_type(&self) -> &'static str {
        "catalog.add_book"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for UpdateBook {
    fn command_type(&self) -> &'static str {
        "catalog.update_book"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for ViewBook {
    fn command_type(&self) -> &'static str {
        "catalog.view_book"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for DeleteBook {
    fn command_type(&self) -> &'static str {
        "catalog.delete_book"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for AddBooksBulk {
    fn command_type(&self) -> &'static str {
        "catalog.add_books_bulk"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for SoftDeleteBooksBulk {
    fn command_type(&self) -> &'static str {
        "catalog.soft_delete_books_bulk"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
