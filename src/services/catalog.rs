//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookInput},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Connectivity probe for the readiness endpoint
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.books.ping().await
    }

    /// List every book, ordered by id
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Create a new book. The ISBN must not already be in the catalog.
    pub async fn create_book(&self, book: BookInput) -> AppResult<Book> {
        book.check()?;
        if self.repository.books.find_by_isbn(&book.isbn, None).await?.is_some() {
            return Err(AppError::Duplicate("ISBN already exists".to_string()));
        }
        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book added to catalog");
        Ok(created)
    }

    /// Replace every field of a book, quantity included
    pub async fn update_book(&self, id: i32, book: BookInput) -> AppResult<Book> {
        book.check()?;
        if self.repository.books.find_by_isbn(&book.isbn, Some(id)).await?.is_some() {
            return Err(AppError::Duplicate("ISBN already exists".to_string()));
        }
        let updated = self.repository.books.update(id, &book).await?;
        tracing::info!(book_id = id, quantity = updated.quantity, "Book updated");
        Ok(updated)
    }

    /// Delete a book. Books referenced by borrow records are kept so that
    /// history stays complete.
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        // Existence first, so an unknown id is a 404 rather than a 400
        self.repository.books.get_by_id(id).await?;
        if self.repository.borrows.count_for_book(id).await? > 0 {
            return Err(AppError::Validation(
                "Book has borrow records and cannot be deleted".to_string(),
            ));
        }
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
