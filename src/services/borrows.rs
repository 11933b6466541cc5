//! Borrow workflow service
//!
//! Orchestrates availability checks, ledger writes and quantity changes.
//! Every borrow or return runs inside one store transaction and relies on
//! conditional writes (`quantity >= n`, `status = 'borrowed'`) rather than
//! on values read earlier, so concurrent requests cannot overdraw a book
//! or return a record twice.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowDetails, BorrowHistoryEntry, BorrowRecord, BorrowStatus},
        user::Role,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    today: fn() -> NaiveDate,
}

impl BorrowsService {
    pub fn new(repository: Repository) -> Self {
        Self::with_clock(repository, super::today)
    }

    pub fn with_clock(repository: Repository, today: fn() -> NaiveDate) -> Self {
        Self { repository, today }
    }

    /// Borrow one copy of a book.
    /// A missing book and a book with no copy left are both reported as not available.
    pub async fn borrow(&self, user_id: i32, book_id: i32) -> AppResult<BorrowRecord> {
        if book_id <= 0 {
            return Err(AppError::Validation("Book ID is required".to_string()));
        }

        let mut tx = self.repository.begin().await?;

        if !tx.decrement_quantity(book_id, 1).await? {
            tracing::warn!(user_id, book_id, "Borrow rejected: book not available");
            return Err(AppError::NotAvailable(vec![book_id]));
        }
        let record = tx.insert_borrow(user_id, book_id, (self.today)()).await?;
        tx.commit().await?;

        tracing::info!(user_id, book_id, borrow_id = record.id, "Book borrowed");
        Ok(record)
    }

    /// Borrow several books at once, all or nothing.
    /// Records are created in request order; a book may be requested more than once.
    pub async fn borrow_batch(&self, user_id: i32, book_ids: &[i32]) -> AppResult<Vec<BorrowRecord>> {
        if book_ids.is_empty() || book_ids.iter().any(|&id| id <= 0) {
            return Err(AppError::Validation("Book ID is required".to_string()));
        }

        // Copies needed per book, in ascending id order
        let mut requested: BTreeMap<i32, i32> = BTreeMap::new();
        for &id in book_ids {
            *requested.entry(id).or_default() += 1;
        }
        let ids: Vec<i32> = requested.keys().copied().collect();

        // Up-front validation: report every offending id, not just the first
        let books = self.repository.books.get_many(&ids).await?;
        let missing: Vec<i32> = ids
            .iter()
            .copied()
            .filter(|id| !books.iter().any(|b| b.id == *id))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(user_id, ?missing, "Batch borrow rejected: unknown books");
            return Err(AppError::BooksNotFound(missing));
        }
        let unavailable: Vec<i32> = books
            .iter()
            .filter(|b| b.quantity < requested[&b.id])
            .map(|b| b.id)
            .collect();
        if !unavailable.is_empty() {
            tracing::warn!(user_id, ?unavailable, "Batch borrow rejected: books not available");
            return Err(AppError::NotAvailable(unavailable));
        }

        // The counts may have changed since the check; the conditional
        // decrements decide. Ascending id order keeps row locks ordered.
        let mut tx = self.repository.begin().await?;
        let mut lost = Vec::new();
        for (&book_id, &count) in &requested {
            if !tx.decrement_quantity(book_id, count).await? {
                lost.push(book_id);
            }
        }
        if !lost.is_empty() {
            tracing::warn!(user_id, ?lost, "Batch borrow rolled back: books taken concurrently");
            return Err(AppError::NotAvailable(lost));
        }

        let today = (self.today)();
        let mut records = Vec::with_capacity(book_ids.len());
        for &book_id in book_ids {
            records.push(tx.insert_borrow(user_id, book_id, today).await?);
        }
        tx.commit().await?;

        tracing::info!(user_id, count = records.len(), "Books borrowed in batch");
        Ok(records)
    }

    /// Return a borrowed book.
    ///
    /// On the self-service path a record owned by someone else is reported
    /// as not found. The admin path requires the admin role and accepts any
    /// record.
    pub async fn return_book(
        &self,
        user_id: i32,
        role: Role,
        record_id: i32,
        as_admin: bool,
    ) -> AppResult<BorrowRecord> {
        if as_admin && role != Role::Admin {
            return Err(AppError::Authorization("Admins only".to_string()));
        }

        let record = self
            .repository
            .borrows
            .get_by_id(record_id)
            .await?
            .filter(|r| as_admin || r.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Borrow record not found".to_string()))?;

        if record.is_returned() {
            return Err(AppError::AlreadyReturned);
        }

        let today = (self.today)();
        let mut tx = self.repository.begin().await?;
        if !tx.mark_returned(record.id, today).await? {
            // Returned by a concurrent request since the lookup
            return Err(AppError::AlreadyReturned);
        }
        // book_id comes from the record as it was looked up
        if !tx.increment_quantity(record.book_id).await? {
            tracing::warn!(borrow_id = record.id, book_id = record.book_id, "Returned book no longer in catalog");
        }
        tx.commit().await?;

        tracing::info!(
            user_id,
            borrow_id = record.id,
            book_id = record.book_id,
            as_admin,
            "Book returned"
        );

        Ok(BorrowRecord {
            status: BorrowStatus::Returned,
            return_date: Some(today),
            ..record
        })
    }

    /// Borrow history of one reader
    pub async fn history(&self, user_id: i32) -> AppResult<Vec<BorrowHistoryEntry>> {
        self.repository.borrows.history(user_id).await
    }

    /// Every borrow record, with borrower and title
    pub async fn all(&self) -> AppResult<Vec<BorrowDetails>> {
        self.repository.borrows.all().await
    }
}
