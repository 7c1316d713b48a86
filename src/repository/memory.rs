//! In-memory store with the same constraints as the PostgreSQL schema

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookDetails, BookFilter, BookSummary, BorrowRequest, BorrowRequestDetails, NewBook,
        NewProfile, Profile, ProfileSummary, RequestStatus,
    },
};

use super::{BookStore, BorrowRequestStore, ProfileStore};

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    // Rows are kept in insertion order; listings reverse it.
    books: Vec<Book>,
    requests: Vec<BorrowRequest>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Make every subsequent call fail like an unreachable database
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn profile_count(&self) -> usize {
        self.tables.lock().unwrap().profiles.len()
    }

    pub fn request_count(&self) -> usize {
        self.tables.lock().unwrap().requests.len()
    }

    fn tables(&self) -> AppResult<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        Ok(self.tables.lock().unwrap())
    }

    fn details(tables: &Tables, request: &BorrowRequest) -> Option<BorrowRequestDetails> {
        let book = tables.books.iter().find(|b| b.id == request.book_id)?;
        let requester = tables.profiles.iter().find(|p| p.id == request.requester_id);
        Some(BorrowRequestDetails {
            id: request.id,
            status: request.status,
            created_at: request.created_at,
            book: BookSummary::from(book),
            requester: ProfileSummary {
                full_name: requester.and_then(|p| p.full_name.clone()),
                email: requester.and_then(|p| p.email.clone()),
            },
        })
    }

    fn list_details<F>(&self, keep: F) -> AppResult<Vec<BorrowRequestDetails>>
    where
        F: Fn(&BorrowRequest) -> bool,
    {
        let tables = self.tables()?;
        Ok(tables
            .requests
            .iter()
            .rev()
            .filter(|r| keep(r))
            .filter_map(|r| Self::details(&tables, r))
            .collect())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let tables = self.tables()?;
        Ok(tables.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, profile: &NewProfile) -> AppResult<Profile> {
        let mut tables = self.tables()?;
        if tables.profiles.iter().any(|p| p.id == profile.id) {
            return Err(AppError::UniqueViolation("profiles_pkey".to_string()));
        }
        let row = Profile {
            id: profile.id,
            email: profile.email.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            created_at: Utc::now(),
        };
        tables.profiles.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let tables = self.tables()?;
        Ok(tables
            .books
            .iter()
            .rev()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Book>> {
        let tables = self.tables()?;
        Ok(tables
            .books
            .iter()
            .rev()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get_details(&self, id: Uuid) -> AppResult<BookDetails> {
        let tables = self.tables()?;
        let book = tables
            .books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        let owner_name = tables
            .profiles
            .iter()
            .find(|p| p.id == book.owner_id)
            .and_then(|p| p.full_name.clone());
        Ok(BookDetails { book, owner_name })
    }

    async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        let mut tables = self.tables()?;
        let row = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            author: book.author.clone(),
            cover_url: book.cover_url.clone(),
            category: book.category,
            owner_id: book.owner_id,
            is_available: true,
            created_at: Utc::now(),
        };
        tables.books.push(row.clone());
        Ok(row)
    }

    async fn ping(&self) -> AppResult<()> {
        self.tables().map(|_| ())
    }
}

#[async_trait]
impl BorrowRequestStore for MemoryStore {
    async fn insert(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
        owner_id: Uuid,
    ) -> AppResult<BorrowRequest> {
        let mut tables = self.tables()?;
        if tables
            .requests
            .iter()
            .any(|r| r.book_id == book_id && r.requester_id == requester_id)
        {
            return Err(AppError::UniqueViolation(
                "borrow_requests_book_id_requester_id_key".to_string(),
            ));
        }
        let row = BorrowRequest {
            id: Uuid::new_v4(),
            book_id,
            requester_id,
            owner_id,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        tables.requests.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRequest>> {
        let tables = self.tables()?;
        Ok(tables.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_received(&self, owner_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list_details(|r| r.owner_id == owner_id)
    }

    async fn list_sent(&self, requester_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list_details(|r| r.requester_id == requester_id)
    }

    async fn resolve_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        status: RequestStatus,
    ) -> AppResult<Option<BorrowRequest>> {
        let mut tables = self.tables()?;
        Ok(tables
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.owner_id == owner_id && r.status == RequestStatus::Pending)
            .map(|r| {
                r.status = status;
                r.clone()
            }))
    }

    async fn count_pending(&self, owner_id: Uuid) -> AppResult<i64> {
        let tables = self.tables()?;
        Ok(tables
            .requests
            .iter()
            .filter(|r| r.owner_id == owner_id && r.status == RequestStatus::Pending)
            .count() as i64)
    }
}
