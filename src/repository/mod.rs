//! Repository layer for database operations
//!
//! Each store concern is a trait so the services can run against either
//! PostgreSQL or the in-memory store. Every mutation of `books.quantity`
//! or `borrows.status` goes through a [`StoreTransaction`], whose writes
//! are conditional so that concurrent requests cannot overdraw a book or
//! return a record twice.

pub mod books;
pub mod borrows;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookInput},
        borrow::{BorrowDetails, BorrowHistoryEntry, BorrowRecord, UserBorrowStats},
        user::{Role, User},
    },
};

/// Catalog store: book records
#[async_trait]
pub trait BooksRepository: Send + Sync {
    /// Cheap connectivity probe used by the readiness check
    async fn ping(&self) -> AppResult<()>;

    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Book>;

    /// Fetch every existing book among `ids` (missing ids are simply absent)
    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Book>>;

    /// Find a book by ISBN, ignoring `exclude_id` (the book being updated)
    async fn find_by_isbn(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<Option<Book>>;

    async fn create(&self, book: &BookInput) -> AppResult<Book>;

    async fn update(&self, id: i32, book: &BookInput) -> AppResult<Book>;

    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// Borrow ledger: read side of borrow records
#[async_trait]
pub trait BorrowsRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<BorrowRecord>>;

    /// Records of one reader with book titles, in insertion order
    async fn history(&self, user_id: i32) -> AppResult<Vec<BorrowHistoryEntry>>;

    /// Every record with borrower name and book title, in insertion order
    async fn all(&self) -> AppResult<Vec<BorrowDetails>>;

    /// Number of records (any status) referencing a book
    async fn count_for_book(&self, book_id: i32) -> AppResult<i64>;

    /// All four reader counters computed from one consistent snapshot
    async fn user_stats(&self, user_id: i32, today: NaiveDate) -> AppResult<UserBorrowStats>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<User>;

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn create(&self, username: &str, password_hash: &str, role: Role) -> AppResult<User>;
}

/// Opens units of work spanning the catalog and the ledger
#[async_trait]
pub trait Transactional: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

/// A unit of work. Dropping it without [`StoreTransaction::commit`]
/// discards every write made through it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Take `count` copies of a book, only if that many are available.
    /// Returns false (and changes nothing) otherwise.
    async fn decrement_quantity(&mut self, book_id: i32, count: i32) -> AppResult<bool>;

    /// Put one copy back. Returns false if the book does not exist.
    async fn increment_quantity(&mut self, book_id: i32) -> AppResult<bool>;

    async fn insert_borrow(
        &mut self,
        user_id: i32,
        book_id: i32,
        borrow_date: NaiveDate,
    ) -> AppResult<BorrowRecord>;

    /// Move a record from borrowed to returned. Returns false if the
    /// record is not currently borrowed.
    async fn mark_returned(&mut self, record_id: i32, return_date: NaiveDate) -> AppResult<bool>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Main repository struct holding the store implementations
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BooksRepository>,
    pub borrows: Arc<dyn BorrowsRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub transactions: Arc<dyn Transactional>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            borrows: Arc::new(borrows::PgBorrowsRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            transactions: Arc::new(borrows::PgTransactions::new(pool)),
        }
    }

    /// Create a repository backed by a fresh, empty in-memory store
    pub fn in_memory() -> Self {
        Self::from_memory(memory::MemoryStore::default())
    }

    pub fn from_memory(store: memory::MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            books: store.clone(),
            borrows: store.clone(),
            users: store.clone(),
            transactions: store,
        }
    }

    pub async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        self.transactions.begin().await
    }
}
