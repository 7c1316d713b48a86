//! Endpoints about the signed-in user

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{Book, Dashboard, Profile},
    AppState,
};

use super::AuthenticatedUser;

/// Get (and create on first use) the caller's profile
#[utoipa::path(
    get,
    path = "/me",
    tag = "profile",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's profile", body = Profile),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Profile>> {
    let profile = state.services.profiles.ensure_profile(&identity).await?;
    Ok(Json(profile))
}

/// Books listed by the caller
#[utoipa::path(
    get,
    path = "/me/books",
    tag = "profile",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's books, newest first", body = Vec<Book>)
    )
)]
pub async fn my_books(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_owned(&identity).await?;
    Ok(Json(books))
}

/// Profile, books and borrow requests in one call
#[utoipa::path(
    get,
    path = "/me/dashboard",
    tag = "profile",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's dashboard", body = Dashboard)
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AppResult<Json<Dashboard>> {
    let dashboard = state.services.profiles.dashboard(&identity).await?;
    Ok(Json(dashboard))
}
