//! Borrow request endpoints

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Serialize;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{BorrowRequest, BorrowRequestDetails, Decision, Identity},
    AppState,
};

use super::AuthenticatedUser;

/// SSE event name carrying the badge value
pub const PENDING_COUNT_EVENT: &str = "pending_count";

/// Pending requests awaiting the caller's decision
#[derive(Serialize, ToSchema)]
pub struct PendingCountResponse {
    pub count: i64,
}

/// Ask to borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Request created (pending)", body = BorrowRequest),
        (status = 400, description = "Book belongs to the caller", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already requested by the caller", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<BorrowRequest>)> {
    let request = state.services.ledger.request_book(&identity, book_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Requests for the caller's books
#[utoipa::path(
    get,
    path = "/requests/received",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Received requests, newest first", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_received(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.ledger.list_received(&identity).await?;
    Ok(Json(requests))
}

/// Requests made by the caller
#[utoipa::path(
    get,
    path = "/requests/sent",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sent requests, newest first", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_sent(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.ledger.list_sent(&identity).await?;
    Ok(Json(requests))
}

/// Accept a pending request
#[utoipa::path(
    post,
    path = "/requests/{id}/accept",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request accepted", body = BorrowRequest),
        (status = 403, description = "Caller does not own the book"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already declined", body = crate::error::ErrorResponse)
    )
)]
pub async fn accept_request(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequest>> {
    resolve(&state, &identity, id, Decision::Accepted).await
}

/// Decline a pending request
#[utoipa::path(
    post,
    path = "/requests/{id}/decline",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request declined", body = BorrowRequest),
        (status = 403, description = "Caller does not own the book"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already accepted", body = crate::error::ErrorResponse)
    )
)]
pub async fn decline_request(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequest>> {
    resolve(&state, &identity, id, Decision::Declined).await
}

async fn resolve(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    decision: Decision,
) -> AppResult<Json<BorrowRequest>> {
    let request = state
        .services
        .ledger
        .resolve_request(identity, id, decision)
        .await?;
    Ok(Json(request))
}

/// Current pending count (manual refresh)
#[utoipa::path(
    get,
    path = "/requests/pending-count",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending requests for the caller's books", body = PendingCountResponse)
    )
)]
pub async fn pending_count(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<PendingCountResponse>> {
    let count = state.services.ledger.pending_count(&identity).await?;
    Ok(Json(PendingCountResponse { count }))
}

/// Live pending count as Server-Sent Events.
///
/// Emits a `pending_count` event with the stored count, then one per change.
/// The stream ends when the server shuts down.
#[utoipa::path(
    get,
    path = "/requests/pending-count/stream",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = String),
        (status = 500, description = "Initial count unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn pending_count_stream(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let badge = state.services.pending_badge(identity.id).await?;
    tracing::debug!("Pending count stream opened for {}", identity.id);

    // Dropping the stream drops the receiver, which stops the badge task.
    // The badge task dropping its sender on feed close ends the stream.
    let stream = WatchStream::new(badge.into_receiver())
        .map(|count| Ok(Event::default().event(PENDING_COUNT_EVENT).data(count.to_string())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
