//! Book catalog service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookDetails, BookFilter, BookQuery, CreateBook, Identity, NewBook},
    repository::Repository,
};

use super::profiles::ProfilesService;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    profiles: ProfilesService,
}

impl CatalogService {
    pub fn new(repository: Repository, profiles: ProfilesService) -> Self {
        Self {
            repository,
            profiles,
        }
    }

    /// Search listings, newest first
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let filter = BookFilter::try_from(query)?;
        tracing::debug!("Listing books with {:?}", filter);
        self.repository.books.list(&filter).await
    }

    /// Get a listing with its owner's name
    pub async fn get_book(&self, id: Uuid) -> AppResult<BookDetails> {
        self.repository.books.get_details(id).await
    }

    /// Listings owned by the caller
    pub async fn list_owned(&self, owner: &Identity) -> AppResult<Vec<Book>> {
        self.repository.books.list_by_owner(owner.id).await
    }

    /// Create a listing owned by the caller
    pub async fn create_book(&self, owner: &Identity, data: CreateBook) -> AppResult<Book> {
        let data = data.normalized();
        data.validate()?;
        let category = data
            .category
            .ok_or_else(|| AppError::Validation("Category is required".to_string()))?;

        self.profiles.ensure_profile(owner).await?;

        let book = self
            .repository
            .books
            .insert(&NewBook {
                title: data.title,
                author: data.author,
                cover_url: data.cover_url,
                category,
                owner_id: owner.id,
            })
            .await?;

        tracing::info!("Book {} listed by {}", book.id, owner.id);
        Ok(book)
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.repository.books.ping().await
    }
}
