//! Business logic services

pub mod auth;
pub mod borrows;
pub mod catalog;
pub mod stats;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository.clone()),
            borrows: borrows::BorrowsService::new(repository.clone()),
            stats: stats::StatsService::new(repository),
        }
    }
}

/// Today's date in UTC, the calendar used for borrow and return dates
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
