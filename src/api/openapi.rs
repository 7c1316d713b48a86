//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, profile, requests};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BookShare API",
        version = "0.3.0",
        description = "Peer-to-peer book lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Profile
        profile::me,
        profile::my_books,
        profile::dashboard,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::lookup_book,
        // Requests
        requests::request_book,
        requests::list_received,
        requests::list_sent,
        requests::accept_request,
        requests::decline_request,
        requests::pending_count,
        requests::pending_count_stream,
    ),
    components(
        schemas(
            // Profile
            crate::models::Profile,
            crate::models::ProfileSummary,
            crate::models::Dashboard,
            // Books
            crate::models::Book,
            crate::models::BookDetails,
            crate::models::BookSummary,
            crate::models::Category,
            crate::models::CreateBook,
            crate::models::ExternalBook,
            books::LookupResponse,
            // Requests
            crate::models::BorrowRequest,
            crate::models::BorrowRequestDetails,
            crate::models::RequestStatus,
            requests::PendingCountResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "profile", description = "The signed-in user"),
        (name = "books", description = "Book catalog"),
        (name = "requests", description = "Borrow requests and the pending badge")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
