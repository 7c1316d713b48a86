//! Book catalog endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, BookDetails, BookQuery, CreateBook, ExternalBook},
    AppState,
};

use super::AuthenticatedUser;

/// External lookup query
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LookupQuery {
    /// Free text (title, author or ISBN)
    pub q: String,
}

/// External lookup result; `book` is null when nothing matched
#[derive(Serialize, ToSchema)]
pub struct LookupResponse {
    pub book: Option<ExternalBook>,
}

/// Search the catalog
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books, newest first", body = Vec<Book>),
        (status = 400, description = "Unknown category", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books(&query).await?;
    Ok(Json(books))
}

/// Get a book with its owner's name
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// List a book for lending
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book listed", body = Book),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Book>)> {
    // Unknown categories and malformed bodies get the same error shape as field validation.
    let Json(data) = payload?;
    let book = state.services.catalog.create_book(&identity, data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Prefill listing details from the public metadata index
#[utoipa::path(
    get,
    path = "/books/lookup",
    tag = "books",
    security(("bearer_auth" = [])),
    params(LookupQuery),
    responses(
        (status = 200, description = "First match, if any", body = LookupResponse),
        (status = 400, description = "Blank query", body = crate::error::ErrorResponse)
    )
)]
pub async fn lookup_book(
    State(state): State<AppState>,
    AuthenticatedUser(_identity): AuthenticatedUser,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<LookupResponse>> {
    let book = state.services.lookup.search(&query.q).await?;
    Ok(Json(LookupResponse { book }))
}
