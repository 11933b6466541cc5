//! Book (catalog) model

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

static ISBN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{10,13}$").expect("static ISBN pattern is valid")
});

/// Book model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    /// 10 to 13 digit ISBN, unique across the catalog
    pub isbn: String,
    /// Number of copies currently available for borrowing
    pub quantity: i32,
}

/// Create/update book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub isbn: String,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: i32,
}

impl BookInput {
    /// Run field validation, including the ISBN format check
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if !is_valid_isbn(&self.isbn) {
            return Err(AppError::Validation(
                "Valid ISBN (10-13 digits) is required".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn is_valid_isbn(isbn: &str) -> bool {
    ISBN_PATTERN.is_match(isbn)
}
