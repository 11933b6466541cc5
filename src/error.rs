//! Error types for the library server

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned alongside every error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchRecord = 6,
    BookNotAvailable = 7,
    Duplicate = 8,
    BadValue = 9,
    AlreadyReturned = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// One or more books have no copy left (or do not exist, for single borrows)
    #[error("Book not available: {0:?}")]
    NotAvailable(Vec<i32>),

    /// Batch borrow referenced ids that are absent from the catalog
    #[error("Books not found: {0:?}")]
    BooksNotFound(Vec<i32>),

    #[error("Book already returned")]
    AlreadyReturned,

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Ids of the books that caused a borrow to be rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_ids: Option<Vec<i32>>,
    /// Diagnostic detail for unexpected failures (debug builds only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn diagnostic(detail: String) -> Option<String> {
    cfg!(debug_assertions).then_some(detail)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut book_ids = None;
        let mut detail = None;

        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::NotAvailable(ids) => {
                book_ids = Some(ids.clone());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorCode::BookNotAvailable,
                    "Book not available".to_string(),
                )
            }
            AppError::BooksNotFound(ids) => {
                book_ids = Some(ids.clone());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorCode::NoSuchBook,
                    "Book not found".to_string(),
                )
            }
            AppError::AlreadyReturned => (
                StatusCode::BAD_REQUEST,
                ErrorCode::AlreadyReturned,
                "Book already returned".to_string(),
            ),
            AppError::Duplicate(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::Duplicate, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                detail = diagnostic(e.to_string());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                detail = diagnostic(msg.clone());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            book_ids,
            detail,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Report the first failing rule's message, like a hand-written check would
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(_, errs)| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| errors.to_string());
        AppError::Validation(message)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
