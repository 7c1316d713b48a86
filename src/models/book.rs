//! Book listing model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Fixed listing categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    Fiction,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Science,
    Technology,
    History,
    Biography,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Fiction,
        Category::NonFiction,
        Category::Science,
        Category::Technology,
        Category::History,
        Category::Biography,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fiction => "Fiction",
            Category::NonFiction => "Non-Fiction",
            Category::Science => "Science",
            Category::Technology => "Technology",
            Category::History => "History",
            Category::Biography => "Biography",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid category: {}", s))
    }
}

impl sqlx::Type<Postgres> for Category {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Category {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Category {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Best-effort mapping of a free-form category from the metadata index.
///
/// Labels are matched as case-insensitive substrings. `Non-Fiction` is tried
/// before `Fiction`, which it contains, so this order differs from
/// [`Category::ALL`]: walking the declaration order would file every
/// "Non-Fiction" label under `Fiction`. Anything unmatched is `Other`.
pub fn map_external_category(raw: &str) -> Category {
    const MATCH_ORDER: [Category; 6] = [
        Category::NonFiction,
        Category::Fiction,
        Category::Science,
        Category::Technology,
        Category::History,
        Category::Biography,
    ];

    let raw = raw.to_lowercase();
    MATCH_ORDER
        .into_iter()
        .find(|c| raw.contains(&c.as_str().to_lowercase()))
        .unwrap_or(Category::Other)
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// Book listing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub category: Category,
    pub owner_id: Uuid,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// Book with its owner's display name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub book: Book,
    pub owner_name: Option<String>,
}

/// Book data shown alongside a borrow request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub is_available: bool,
    pub category: Category,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            is_available: book.is_available,
            category: book.category,
        }
    }
}

/// Catalog query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive text matched against title or author
    pub search: Option<String>,
    /// Exact category label
    pub category: Option<String>,
}

/// Normalized catalog filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
}

impl BookFilter {
    /// Whether a book passes the filter (same semantics as the SQL query)
    pub fn matches(&self, book: &Book) -> bool {
        let text_ok = self.search.as_deref().map_or(true, |s| {
            let needle = s.to_lowercase();
            book.title.to_lowercase().contains(&needle)
                || book.author.to_lowercase().contains(&needle)
        });
        let category_ok = self.category.map_or(true, |c| book.category == c);
        text_ok && category_ok
    }
}

impl TryFrom<&BookQuery> for BookFilter {
    type Error = AppError;

    fn try_from(query: &BookQuery) -> AppResult<Self> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let category = query
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| c.parse::<Category>().map_err(AppError::Validation))
            .transpose()?;
        Ok(Self { search, category })
    }
}

/// Create listing request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub author: String,
    #[validate(url)]
    pub cover_url: Option<String>,
    #[validate(required)]
    pub category: Option<Category>,
}

impl CreateBook {
    /// Trim text fields; an empty cover URL means no cover
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            cover_url: self
                .cover_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            category: self.category,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Validated listing ready for insertion
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub category: Category,
    pub owner_id: Uuid,
}

/// Candidate listing found in the external metadata index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExternalBook {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub category: Category,
}
