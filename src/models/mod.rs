//! Data models for the library server

pub mod book;
pub mod borrow;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookInput};
pub use borrow::{BorrowDetails, BorrowHistoryEntry, BorrowRecord, BorrowStatus, UserBorrowStats};
pub use user::{Role, User, UserClaims};
