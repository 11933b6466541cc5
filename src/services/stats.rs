//! Reader statistics service

use chrono::NaiveDate;

use crate::{error::AppResult, models::borrow::UserBorrowStats, repository::Repository};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    today: fn() -> NaiveDate,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self::with_clock(repository, super::today)
    }

    pub fn with_clock(repository: Repository, today: fn() -> NaiveDate) -> Self {
        Self { repository, today }
    }

    /// Borrow counters for one reader.
    /// A book is due soon once it has been out for 7 days (14-day loan period).
    pub async fn get_user_stats(&self, user_id: i32) -> AppResult<UserBorrowStats> {
        self.repository
            .borrows
            .user_stats(user_id, (self.today)())
            .await
    }
}
