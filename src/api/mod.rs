//! API handlers for the BookShare REST endpoints

pub mod books;
pub mod health;
pub mod openapi;
pub mod profile;
pub mod requests;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::{Identity, IdentityClaims},
    AppState,
};

/// Extractor for the signed-in user from the provider's JWT
pub struct AuthenticatedUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let auth = &state.config.auth;
        let claims = IdentityClaims::from_token(token, &auth.jwt_secret, auth.audience.as_deref())
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims.into()))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Profile
        .route("/me", get(profile::me))
        .route("/me/books", get(profile::my_books))
        .route("/me/dashboard", get(profile::dashboard))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/lookup", get(books::lookup_book))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/requests", post(requests::request_book))
        // Borrow requests
        .route("/requests/received", get(requests::list_received))
        .route("/requests/sent", get(requests::list_sent))
        .route("/requests/pending-count", get(requests::pending_count))
        .route("/requests/pending-count/stream", get(requests::pending_count_stream))
        .route("/requests/:id/accept", post(requests::accept_request))
        .route("/requests/:id/decline", post(requests::decline_request))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
