//! Borrow requests repository for database operations

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{BookSummary, BorrowRequest, BorrowRequestDetails, ProfileSummary, RequestStatus},
};

use super::BorrowRequestStore;

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.status, r.created_at,
           b.id AS book_id, b.title, b.author, b.is_available, b.category,
           p.full_name AS requester_name, p.email AS requester_email
    FROM borrow_requests r
    JOIN books b ON b.id = r.book_id
    LEFT JOIN profiles p ON p.id = r.requester_id
"#;

#[derive(Clone)]
pub struct BorrowRequestsRepository {
    pool: Pool<Postgres>,
}

impl BorrowRequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn list_details(&self, column: &str, profile_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        let query = format!(
            "{} WHERE r.{} = $1 ORDER BY r.created_at DESC",
            DETAILS_SELECT, column
        );
        let rows = sqlx::query(&query)
            .bind(profile_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(details_from_row).collect())
    }
}

fn details_from_row(row: &PgRow) -> BorrowRequestDetails {
    BorrowRequestDetails {
        id: row.get("id"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        book: BookSummary {
            id: row.get("book_id"),
            title: row.get("title"),
            author: row.get("author"),
            is_available: row.get("is_available"),
            category: row.get("category"),
        },
        requester: ProfileSummary {
            full_name: row.get("requester_name"),
            email: row.get("requester_email"),
        },
    }
}

#[async_trait]
impl BorrowRequestStore for BorrowRequestsRepository {
    async fn insert(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
        owner_id: Uuid,
    ) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>(
            r#"
            INSERT INTO borrow_requests (book_id, requester_id, owner_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(requester_id)
        .bind(owner_id)
        .bind(RequestStatus::Pending)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_write)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRequest>> {
        let request = sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn list_received(&self, owner_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list_details("owner_id", owner_id).await
    }

    async fn list_sent(&self, requester_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list_details("requester_id", requester_id).await
    }

    async fn resolve_pending(
        &self,
        id: Uuid,
        owner_id: Uuid,
        status: RequestStatus,
    ) -> AppResult<Option<BorrowRequest>> {
        let request = sqlx::query_as::<_, BorrowRequest>(
            r#"
            UPDATE borrow_requests
            SET status = $1
            WHERE id = $2 AND owner_id = $3 AND status = $4
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(id)
        .bind(owner_id)
        .bind(RequestStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn count_pending(&self, owner_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_requests WHERE owner_id = $1 AND status = $2",
        )
        .bind(owner_id)
        .bind(RequestStatus::Pending)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
