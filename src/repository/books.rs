//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookDetails, BookFilter, NewBook},
};

use super::{like_pattern, BookStore};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.search.is_some() {
            conditions.push(format!("(title ILIKE ${0} OR author ILIKE ${0})", idx));
            idx += 1;
        }
        if filter.category.is_some() {
            conditions.push(format!("category = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT * FROM books {} ORDER BY created_at DESC",
            where_clause
        );

        let mut builder = sqlx::query_as::<_, Book>(&query);
        if let Some(ref search) = filter.search {
            builder = builder.bind(like_pattern(search));
        }
        if let Some(category) = filter.category {
            builder = builder.bind(category);
        }

        let books = builder.fetch_all(&self.pool).await?;
        Ok(books)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn get_details(&self, id: Uuid) -> AppResult<BookDetails> {
        sqlx::query_as::<_, BookDetails>(
            r#"
            SELECT b.*, p.full_name AS owner_name
            FROM books b
            LEFT JOIN profiles p ON p.id = b.owner_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, cover_url, category, owner_id, is_available)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.cover_url)
        .bind(book.category)
        .bind(book.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_write)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
