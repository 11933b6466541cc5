//! In-memory store
//!
//! Backs the repository traits with plain maps behind one async mutex.
//! A transaction holds the lock for its whole lifetime and keeps an undo
//! log of its writes, so it is serializable and all-or-nothing. Nothing is
//! persisted across restarts.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookInput},
        borrow::{BorrowDetails, BorrowHistoryEntry, BorrowRecord, BorrowStatus, UserBorrowStats},
        user::{Role, User},
    },
};

use super::{BooksRepository, BorrowsRepository, StoreTransaction, Transactional, UsersRepository};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i32, User>,
    books: BTreeMap<i32, Book>,
    borrows: BTreeMap<i32, BorrowRecord>,
    last_user_id: i32,
    last_book_id: i32,
    last_borrow_id: i32,
}

fn next_id(last: &mut i32) -> i32 {
    *last += 1;
    *last
}

impl MemoryState {
    fn isbn_taken(&self, isbn: &str, exclude_id: Option<i32>) -> Option<&Book> {
        self.books
            .values()
            .find(|b| b.isbn == isbn && Some(b.id) != exclude_id)
    }

    fn decrement_quantity(&mut self, book_id: i32, count: i32) -> bool {
        match self.books.get_mut(&book_id) {
            Some(book) if book.quantity >= count => {
                book.quantity -= count;
                true
            }
            _ => false,
        }
    }

    fn increment_quantity(&mut self, book_id: i32) -> bool {
        match self.books.get_mut(&book_id) {
            Some(book) => {
                book.quantity += 1;
                true
            }
            None => false,
        }
    }

    fn insert_borrow(&mut self, user_id: i32, book_id: i32, borrow_date: NaiveDate) -> AppResult<BorrowRecord> {
        // Mirror the foreign keys of the SQL schema
        if !self.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        if !self.books.contains_key(&book_id) {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        let record = BorrowRecord {
            id: next_id(&mut self.last_borrow_id),
            user_id,
            book_id,
            status: BorrowStatus::Borrowed,
            borrow_date,
            return_date: None,
        };
        self.borrows.insert(record.id, record.clone());
        Ok(record)
    }

    fn mark_returned(&mut self, record_id: i32, return_date: NaiveDate) -> bool {
        match self.borrows.get_mut(&record_id) {
            Some(record) if record.status == BorrowStatus::Borrowed => {
                record.status = BorrowStatus::Returned;
                record.return_date = Some(return_date);
                true
            }
            _ => false,
        }
    }

    fn title_of(&self, book_id: i32) -> Option<String> {
        self.books.get(&book_id).map(|b| b.title.clone())
    }
}

/// Non-persistent store, shared by cloning
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(state.books.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let state = self.state.lock().await;
        state
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn find_by_isbn(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<Option<Book>> {
        let state = self.state.lock().await;
        Ok(state.isbn_taken(isbn, exclude_id).cloned())
    }

    async fn create(&self, book: &BookInput) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        if state.isbn_taken(&book.isbn, None).is_some() {
            return Err(AppError::Duplicate("ISBN already exists".to_string()));
        }
        let created = Book {
            id: next_id(&mut state.last_book_id),
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            quantity: book.quantity,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, book: &BookInput) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        if state.isbn_taken(&book.isbn, Some(id)).is_some() {
            return Err(AppError::Duplicate("ISBN already exists".to_string()));
        }
        let existing = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
        existing.title = book.title.clone();
        existing.author = book.author.clone();
        existing.isbn = book.isbn.clone();
        existing.quantity = book.quantity;
        Ok(existing.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&id) {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        if state.borrows.values().any(|r| r.book_id == id) {
            return Err(AppError::Validation(
                "Book has borrow records and cannot be deleted".to_string(),
            ));
        }
        state.books.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BorrowsRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<BorrowRecord>> {
        let state = self.state.lock().await;
        Ok(state.borrows.get(&id).cloned())
    }

    async fn history(&self, user_id: i32) -> AppResult<Vec<BorrowHistoryEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .borrows
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| {
                let title = state.title_of(r.book_id)?;
                Some(BorrowHistoryEntry { record: r.clone(), title })
            })
            .collect())
    }

    async fn all(&self) -> AppResult<Vec<BorrowDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .borrows
            .values()
            .filter_map(|r| {
                let username = state.users.get(&r.user_id)?.username.clone();
                let title = state.title_of(r.book_id)?;
                Some(BorrowDetails { record: r.clone(), username, title })
            })
            .collect())
    }

    async fn count_for_book(&self, book_id: i32) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.borrows.values().filter(|r| r.book_id == book_id).count() as i64)
    }

    async fn user_stats(&self, user_id: i32, today: NaiveDate) -> AppResult<UserBorrowStats> {
        let state = self.state.lock().await;
        let mut stats = UserBorrowStats::default();
        for record in state.borrows.values().filter(|r| r.user_id == user_id) {
            stats.count(record, today);
        }
        Ok(stats)
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, username: &str, password_hash: &str, role: Role) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == username) {
            return Err(AppError::Duplicate("Username already exists".to_string()));
        }
        let user = User {
            id: next_id(&mut state.last_user_id),
            username: username.to_string(),
            password: password_hash.to_string(),
            role,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            undo: Vec::new(),
        }))
    }
}

/// Inverse of one write made through a [`MemoryTransaction`]
#[derive(Debug)]
enum Undo {
    Decrement { book_id: i32, count: i32 },
    Increment { book_id: i32 },
    Insert { record_id: i32 },
    Return { record_id: i32 },
}

/// Writes go straight to the locked state; the undo log is replayed in
/// reverse on drop unless the transaction was committed.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    undo: Vec<Undo>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let state = &mut *self.guard;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Decrement { book_id, count } => {
                    if let Some(book) = state.books.get_mut(&book_id) {
                        book.quantity += count;
                    }
                }
                Undo::Increment { book_id } => {
                    if let Some(book) = state.books.get_mut(&book_id) {
                        book.quantity -= 1;
                    }
                }
                Undo::Insert { record_id } => {
                    state.borrows.remove(&record_id);
                    state.last_borrow_id = record_id - 1;
                }
                Undo::Return { record_id } => {
                    if let Some(record) = state.borrows.get_mut(&record_id) {
                        record.status = BorrowStatus::Borrowed;
                        record.return_date = None;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn decrement_quantity(&mut self, book_id: i32, count: i32) -> AppResult<bool> {
        let done = self.guard.decrement_quantity(book_id, count);
        if done {
            self.undo.push(Undo::Decrement { book_id, count });
        }
        Ok(done)
    }

    async fn increment_quantity(&mut self, book_id: i32) -> AppResult<bool> {
        let done = self.guard.increment_quantity(book_id);
        if done {
            self.undo.push(Undo::Increment { book_id });
        }
        Ok(done)
    }

    async fn insert_borrow(
        &mut self,
        user_id: i32,
        book_id: i32,
        borrow_date: NaiveDate,
    ) -> AppResult<BorrowRecord> {
        let record = self.guard.insert_borrow(user_id, book_id, borrow_date)?;
        self.undo.push(Undo::Insert { record_id: record.id });
        Ok(record)
    }

    async fn mark_returned(&mut self, record_id: i32, return_date: NaiveDate) -> AppResult<bool> {
        let done = self.guard.mark_returned(record_id, return_date);
        if done {
            self.undo.push(Undo::Return { record_id });
        }
        Ok(done)
    }

    async fn commit(mut self: Box<Self>) -> AppResult<()> {
        self.undo.clear();
        Ok(())
    }
}
