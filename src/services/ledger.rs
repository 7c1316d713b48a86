//! Borrow request ledger: creation, listing and owner resolution

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        BorrowRequest, BorrowRequestDetails, ChangeEvent, ChangeKind, Decision, Identity,
        Resolution,
    },
    repository::Repository,
};

use super::{profiles::ProfilesService, realtime::ChangeFeed};

#[derive(Clone)]
pub struct LedgerService {
    repository: Repository,
    profiles: ProfilesService,
    feed: ChangeFeed,
}

impl LedgerService {
    pub fn new(repository: Repository, profiles: ProfilesService, feed: ChangeFeed) -> Self {
        Self {
            repository,
            profiles,
            feed,
        }
    }

    /// Ask the owner of `book_id` to lend it to `requester`
    pub async fn request_book(&self, requester: &Identity, book_id: Uuid) -> AppResult<BorrowRequest> {
        let book = self.repository.books.get_details(book_id).await?.book;
        if book.owner_id == requester.id {
            return Err(AppError::SelfRequest);
        }

        self.profiles.ensure_profile(requester).await?;

        let request = self
            .repository
            .requests
            .insert(book.id, requester.id, book.owner_id)
            .await
            .map_err(|e| match e {
                AppError::UniqueViolation(_) => AppError::AlreadyRequested,
                other => other,
            })?;

        tracing::info!(
            "Borrow request {} created for book {} by {}",
            request.id,
            book.id,
            requester.id
        );
        self.feed
            .record(ChangeEvent::borrow_request(ChangeKind::Insert, request.id));
        Ok(request)
    }

    /// Requests addressed to the owner, newest first
    pub async fn list_received(&self, owner: &Identity) -> AppResult<Vec<BorrowRequestDetails>> {
        self.repository.requests.list_received(owner.id).await
    }

    /// Requests made by the requester, newest first
    pub async fn list_sent(&self, requester: &Identity) -> AppResult<Vec<BorrowRequestDetails>> {
        self.repository.requests.list_sent(requester.id).await
    }

    /// Accept or decline a pending request.
    ///
    /// Repeating the decision that was already applied is a no-op; the
    /// opposite decision on a resolved request is rejected.
    pub async fn resolve_request(
        &self,
        owner: &Identity,
        request_id: Uuid,
        decision: Decision,
    ) -> AppResult<BorrowRequest> {
        let target = decision.into();
        if let Some(request) = self
            .repository
            .requests
            .resolve_pending(request_id, owner.id, target)
            .await?
        {
            tracing::info!("Borrow request {} {}", request.id, request.status);
            self.feed
                .record(ChangeEvent::borrow_request(ChangeKind::Update, request.id));
            return Ok(request);
        }

        let current = self
            .repository
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow request {} not found", request_id)))?;

        if current.owner_id != owner.id {
            return Err(AppError::Authorization(
                "Only the book owner can resolve this request".to_string(),
            ));
        }

        match current.status.resolve(decision) {
            Resolution::Unchanged => Ok(current),
            Resolution::Rejected(status) => Err(AppError::AlreadyResolved(status.to_string())),
            // Still pending: it changed under us between the update and the read
            Resolution::Applied(_) => Err(AppError::Internal(format!(
                "Borrow request {} could not be resolved",
                request_id
            ))),
        }
    }

    /// Pending requests addressed to the owner
    pub async fn pending_count(&self, owner: &Identity) -> AppResult<i64> {
        self.repository.requests.count_pending(owner.id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::{
        config::RealtimeConfig,
        models::{Book, BookDetails, Category, RequestStatus},
        repository::{memory::MemoryStore, MockBookStore, MockBorrowRequestStore},
        services::catalog::CatalogService,
    };

    fn identity(name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: Some(format!("{}@example.org", name)),
            full_name: Some(name.to_string()),
            avatar_url: None,
        }
    }

    struct Fixture {
        ledger: LedgerService,
        catalog: CatalogService,
        feed: ChangeFeed,
        store: MemoryStore,
    }

    fn fixture() -> Fixture {
        let (repository, store) = Repository::in_memory();
        let profiles = ProfilesService::new(repository.clone());
        let feed = ChangeFeed::new(&RealtimeConfig::default());
        Fixture {
            ledger: LedgerService::new(repository.clone(), profiles.clone(), feed.clone()),
            catalog: CatalogService::new(repository, profiles),
            feed,
            store,
        }
    }

    async fn listed_book(fixture: &Fixture, owner: &Identity) -> Book {
        fixture
            .catalog
            .create_book(
                owner,
                crate::models::CreateBook {
                    title: "Dune".into(),
                    author: "F. Herbert".into(),
                    cover_url: None,
                    category: Some(Category::Science),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_is_pending_and_duplicate_is_rejected() {
        let fixture = fixture();
        let (owner, borrower) = (identity("ana"), identity("bob"));
        let book = listed_book(&fixture, &owner).await;

        let request = fixture.ledger.request_book(&borrower, book.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.owner_id, owner.id);

        let again = fixture.ledger.request_book(&borrower, book.id).await;
        assert!(matches!(again, Err(AppError::AlreadyRequested)));
        assert_eq!(fixture.store.request_count(), 1);
    }

    #[tokio::test]
    async fn test_request_does_not_change_availability() {
        let fixture = fixture();
        let (owner, borrower) = (identity("ana"), identity("bob"));
        let book = listed_book(&fixture, &owner).await;

        let request = fixture.ledger.request_book(&borrower, book.id).await.unwrap();
        fixture
            .ledger
            .resolve_request(&owner, request.id, Decision::Accepted)
            .await
            .unwrap();

        let details = fixture.catalog.get_book(book.id).await.unwrap();
        assert!(details.book.is_available);
    }

    #[tokio::test]
    async fn test_self_request_never_reaches_the_ledger() {
        let owner = identity("ana");
        let book = Book {
            id: Uuid::new_v4(),
            title: "Dune".into(),
            author: "F. Herbert".into(),
            cover_url: None,
            category: Category::Science,
            owner_id: owner.id,
            is_available: true,
            created_at: Utc::now(),
        };

        let mut books = MockBookStore::new();
        books.expect_get_details().returning(move |_| {
            Ok(BookDetails {
                book: book.clone(),
                owner_name: Some("ana".into()),
            })
        });
        let mut requests = MockBorrowRequestStore::new();
        requests.expect_insert().never();

        let (mut repository, _) = Repository::in_memory();
        repository.books = Arc::new(books);
        repository.requests = Arc::new(requests);
        let ledger = LedgerService::new(
            repository.clone(),
            ProfilesService::new(repository),
            ChangeFeed::new(&RealtimeConfig::default()),
        );

        let result = ledger.request_book(&owner, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::SelfRequest)));
    }

    #[tokio::test]
    async fn test_request_for_missing_book_is_not_found() {
        let fixture = fixture();
        let result = fixture.ledger.request_book(&identity("bob"), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolution_is_terminal() {
        let fixture = fixture();
        let (owner, borrower) = (identity("ana"), identity("bob"));
        let book = listed_book(&fixture, &owner).await;
        let request = fixture.ledger.request_book(&borrower, book.id).await.unwrap();

        let accepted = fixture
            .ledger
            .resolve_request(&owner, request.id, Decision::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);

        let repeated = fixture
            .ledger
            .resolve_request(&owner, request.id, Decision::Accepted)
            .await
            .unwrap();
        assert_eq!(repeated.status, RequestStatus::Accepted);

        let flipped = fixture
            .ledger
            .resolve_request(&owner, request.id, Decision::Declined)
            .await;
        assert!(matches!(flipped, Err(AppError::AlreadyResolved(_))));

        let sent = fixture.ledger.list_sent(&borrower).await.unwrap();
        assert_eq!(sent[0].status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_only_owner_resolves() {
        let fixture = fixture();
        let (owner, borrower) = (identity("ana"), identity("bob"));
        let book = listed_book(&fixture, &owner).await;
        let request = fixture.ledger.request_book(&borrower, book.id).await.unwrap();

        let result = fixture
            .ledger
            .resolve_request(&borrower, request.id, Decision::Accepted)
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        let missing = fixture
            .ledger
            .resolve_request(&owner, Uuid::new_v4(), Decision::Declined)
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        assert_eq!(fixture.ledger.pending_count(&owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listings_are_joined_and_scoped() {
        let fixture = fixture();
        let (owner, bob, cy) = (identity("ana"), identity("bob"), identity("cy"));
        let book = listed_book(&fixture, &owner).await;
        fixture.ledger.request_book(&bob, book.id).await.unwrap();
        fixture.ledger.request_book(&cy, book.id).await.unwrap();

        let received = fixture.ledger.list_received(&owner).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].requester.full_name.as_deref(), Some("cy"));
        assert_eq!(received[1].requester.email.as_deref(), Some("bob@example.org"));
        assert_eq!(received[0].book.title, "Dune");

        assert_eq!(fixture.ledger.list_sent(&bob).await.unwrap().len(), 1);
        assert!(fixture.ledger.list_received(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_mutations_are_published() {
        let fixture = fixture();
        let (owner, borrower) = (identity("ana"), identity("bob"));
        let book = listed_book(&fixture, &owner).await;
        let mut subscription = fixture.feed.subscribe();

        let request = fixture.ledger.request_book(&borrower, book.id).await.unwrap();
        let _ = fixture.ledger.request_book(&borrower, book.id).await;
        fixture
            .ledger
            .resolve_request(&owner, request.id, Decision::Declined)
            .await
            .unwrap();

        let first = subscription.next().await.unwrap();
        assert_eq!((first.kind, first.record_id), (ChangeKind::Insert, Some(request.id)));
        let second = subscription.next().await.unwrap();
        assert_eq!((second.kind, second.record_id), (ChangeKind::Update, Some(request.id)));
    }
}
