//! Borrow and return endpoints

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::borrow::{BorrowDetails, BorrowHistoryEntry, BorrowRecord},
    AppState,
};

use super::{ApiJson, ApiPath, AuthenticatedUser};

/// Borrow request: a single `bookId` or a batch of `bookIds`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub book_id: Option<i32>,
    /// Borrowed all together or not at all; an id may repeat to take several copies
    pub book_ids: Option<Vec<i32>>,
}

#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    pub message: String,
    /// Created records, in request order
    pub records: Vec<BorrowRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    pub record: BorrowRecord,
}

/// Borrow one or several books
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "borrow",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Books borrowed", body = BorrowResponse),
        (status = 400, description = "Missing id, unknown or unavailable book", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<BorrowRequest>,
) -> AppResult<Json<BorrowResponse>> {
    let records = match (request.book_ids, request.book_id) {
        (Some(ids), _) => {
            state
                .services
                .borrows
                .borrow_batch(claims.user_id, &ids)
                .await?
        }
        (None, Some(id)) => vec![state.services.borrows.borrow(claims.user_id, id).await?],
        (None, None) => return Err(AppError::Validation("Book ID is required".to_string())),
    };

    let message = if records.len() == 1 {
        "Book borrowed successfully"
    } else {
        "Books borrowed successfully"
    };
    Ok(Json(BorrowResponse {
        message: message.to_string(),
        records,
    }))
}

/// Return a book borrowed by the current user
#[utoipa::path(
    post,
    path = "/borrow/return/{id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Already returned", body = crate::error::ErrorResponse),
        (status = 404, description = "No such record for this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(record_id): ApiPath<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let record = state
        .services
        .borrows
        .return_book(claims.user_id, claims.role, record_id, false)
        .await?;

    Ok(Json(ReturnResponse {
        message: "Book returned successfully".to_string(),
        record,
    }))
}

/// Mark any borrow record as returned
#[utoipa::path(
    post,
    path = "/borrow/admin/return/{id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book marked as returned", body = ReturnResponse),
        (status = 400, description = "Already returned", body = crate::error::ErrorResponse),
        (status = 403, description = "Admins only", body = crate::error::ErrorResponse),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn admin_return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(record_id): ApiPath<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let record = state
        .services
        .borrows
        .return_book(claims.user_id, claims.role, record_id, true)
        .await?;

    Ok(Json(ReturnResponse {
        message: "Book marked as returned successfully".to_string(),
        record,
    }))
}

/// Borrow history of the current user
#[utoipa::path(
    get,
    path = "/borrow/history",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrow records with book titles", body = Vec<BorrowHistoryEntry>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowHistoryEntry>>> {
    let entries = state.services.borrows.history(claims.user_id).await?;
    Ok(Json(entries))
}

/// Every borrow record in the library
#[utoipa::path(
    get,
    path = "/borrow/all",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All borrow records", body = Vec<BorrowDetails>),
        (status = 403, description = "Admins only", body = crate::error::ErrorResponse)
    )
)]
pub async fn all_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_admin()?;

    let entries = state.services.borrows.all().await?;
    Ok(Json(entries))
}
