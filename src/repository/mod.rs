//! Repository layer for database operations
//!
//! Each table is reached through a store trait so services can run against
//! PostgreSQL in production and against mocks or the in-memory store in tests.

pub mod books;
pub mod borrow_requests;
#[cfg(test)]
pub mod memory;
pub mod profiles;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Book, BookDetails, BookFilter, BorrowRequest, BorrowRequestDetails, NewBook, NewProfile,
        Profile, RequestStatus,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, id: Uuid) -> AppResult<Option<Profile>>;

    /// Fails with `UniqueViolation` when the profile already exists
    async fn insert(&self, profile: &NewProfile) -> AppResult<Profile>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Matching books, newest first
    async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>>;

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Book>>;

    /// Book joined with its owner's name; `NotFound` when missing
    async fn get_details(&self, id: Uuid) -> AppResult<BookDetails>;

    async fn insert(&self, book: &NewBook) -> AppResult<Book>;

    async fn ping(&self) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowRequestStore: Send + Sync {
    /// Insert a pending request; `UniqueViolation` when the pair already exists
    async fn insert(&self, book_id: Uuid, requester_id: Uuid, owner_id: Uuid)
        -> AppResult<BorrowRequest>;

    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRequest>>;

    async fn list_received(&self, owner_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>>;

    async fn list_sent(&self, requester_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>>;

    /// Move a pending request owned by `owner_id` to `status`.
    /// Returns `None` when no pending row matched.
    async fn resolve_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        status: RequestStatus,
    ) -> AppResult<Option<BorrowRequest>>;

    async fn count_pending(&self, owner_id: Uuid) -> AppResult<i64>;
}

/// Main repository struct holding one store per table
#[derive(Clone)]
pub struct Repository {
    pub profiles: Arc<dyn ProfileStore>,
    pub books: Arc<dyn BookStore>,
    pub requests: Arc<dyn BorrowRequestStore>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            profiles: Arc::new(profiles::ProfilesRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            requests: Arc::new(borrow_requests::BorrowRequestsRepository::new(pool)),
        }
    }

    /// Repository over a single shared in-memory store
    #[cfg(test)]
    pub fn in_memory() -> (Self, memory::MemoryStore) {
        let store = memory::MemoryStore::default();
        let repository = Self {
            profiles: Arc::new(store.clone()),
            books: Arc::new(store.clone()),
            requests: Arc::new(store.clone()),
        };
        (repository, store)
    }
}

/// Escape LIKE wildcards so user text is matched literally
pub(crate) fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
