//! Borrows repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::borrow::{
        due_soon_threshold, BorrowDetails, BorrowHistoryEntry, BorrowRecord, BorrowStatus,
        UserBorrowStats,
    },
};

use super::{books, BorrowsRepository, StoreTransaction, Transactional};

#[derive(Clone)]
pub struct PgBorrowsRepository {
    pool: Pool<Postgres>,
}

impl PgBorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowsRepository for PgBorrowsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn history(&self, user_id: i32) -> AppResult<Vec<BorrowHistoryEntry>> {
        let entries = sqlx::query_as::<_, BorrowHistoryEntry>(
            r#"
            SELECT b.*, bk.title
            FROM borrows b
            JOIN books bk ON b.book_id = bk.id
            WHERE b.user_id = $1
            ORDER BY b.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn all(&self) -> AppResult<Vec<BorrowDetails>> {
        let entries = sqlx::query_as::<_, BorrowDetails>(
            r#"
            SELECT b.*, u.username, bk.title
            FROM borrows b
            JOIN users u ON b.user_id = u.id
            JOIN books bk ON b.book_id = bk.id
            ORDER BY b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn count_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrows WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn user_stats(&self, user_id: i32, today: NaiveDate) -> AppResult<UserBorrowStats> {
        // One statement, so all counters come from the same snapshot
        let stats = sqlx::query_as::<_, UserBorrowStats>(
            r#"
            SELECT COUNT(*) AS books_borrowed,
                   COUNT(*) FILTER (WHERE status = 'borrowed') AS currently_reading,
                   COUNT(*) FILTER (WHERE status = 'returned') AS completed_books,
                   COUNT(*) FILTER (WHERE status = 'borrowed' AND borrow_date <= $2) AS books_due_soon
            FROM borrows
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(due_soon_threshold(today))
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

/// Opens PostgreSQL transactions for the borrow workflow
#[derive(Clone)]
pub struct PgTransactions {
    pool: Pool<Postgres>,
}

impl PgTransactions {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Transactional for PgTransactions {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

/// Rolled back by sqlx when dropped uncommitted
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn decrement_quantity(&mut self, book_id: i32, count: i32) -> AppResult<bool> {
        books::decrement_quantity(&mut *self.tx, book_id, count).await
    }

    async fn increment_quantity(&mut self, book_id: i32) -> AppResult<bool> {
        books::increment_quantity(&mut *self.tx, book_id).await
    }

    async fn insert_borrow(
        &mut self,
        user_id: i32,
        book_id: i32,
        borrow_date: NaiveDate,
    ) -> AppResult<BorrowRecord> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrows (user_id, book_id, status, borrow_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(BorrowStatus::Borrowed)
        .bind(borrow_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn mark_returned(&mut self, record_id: i32, return_date: NaiveDate) -> AppResult<bool> {
        // The status guard makes the transition happen at most once
        let result = sqlx::query(
            "UPDATE borrows SET status = $2, return_date = $3 WHERE id = $1 AND status = $4",
        )
        .bind(record_id)
        .bind(BorrowStatus::Returned)
        .bind(return_date)
        .bind(BorrowStatus::Borrowed)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
