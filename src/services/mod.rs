//! Business logic services

pub mod catalog;
pub mod ledger;
pub mod lookup;
pub mod profiles;
pub mod realtime;
pub mod redis;

use crate::{config::LookupConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub profiles: profiles::ProfilesService,
    pub catalog: catalog::CatalogService,
    pub ledger: ledger::LedgerService,
    pub lookup: lookup::BookLookupService,
    pub feed: realtime::ChangeFeed,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        feed: realtime::ChangeFeed,
        lookup_config: &LookupConfig,
        redis_service: Option<redis::RedisService>,
    ) -> AppResult<Self> {
        let profiles = profiles::ProfilesService::new(repository.clone());
        Ok(Self {
            catalog: catalog::CatalogService::new(repository.clone(), profiles.clone()),
            ledger: ledger::LedgerService::new(repository.clone(), profiles.clone(), feed.clone()),
            lookup: lookup::BookLookupService::new(lookup_config, redis_service)?,
            profiles,
            feed,
            repository,
        })
    }

    /// Live pending-request count for an owner, starting from the stored count
    pub async fn pending_badge(&self, owner_id: uuid::Uuid) -> AppResult<realtime::PendingBadge> {
        realtime::PendingBadge::open(&self.feed, self.repository.requests.clone(), owner_id).await
    }
}
