//! Data models for BookShare

pub mod book;
pub mod borrow_request;
pub mod change;
pub mod identity;
pub mod profile;

// Re-export commonly used types
pub use book::{
    Book, BookDetails, BookFilter, BookQuery, BookSummary, Category, CreateBook, ExternalBook, NewBook,
};
pub use borrow_request::{BorrowRequest, BorrowRequestDetails, Decision, RequestStatus, Resolution};
pub use change::{ChangeEvent, ChangeKind};
pub use identity::{Identity, IdentityClaims};
pub use profile::{Dashboard, NewProfile, Profile, ProfileSummary};
