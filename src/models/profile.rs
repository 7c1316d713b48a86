//! User profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{book::Book, borrow_request::BorrowRequestDetails, identity::Identity};

/// Profile record, keyed by the identity id
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Requester data shown alongside a borrow request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileSummary {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Profile to insert on first use of an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&Identity> for NewProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            full_name: identity.display_name(),
            avatar_url: identity.avatar_url.clone(),
        }
    }
}

/// Everything shown on the caller's own page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Dashboard {
    pub profile: Profile,
    pub books: Vec<Book>,
    pub received: Vec<BorrowRequestDetails>,
    pub sent: Vec<BorrowRequestDetails>,
}
