//! Profile directory service

use crate::{
    error::{AppError, AppResult},
    models::{Dashboard, Identity, NewProfile, Profile},
    repository::Repository,
};

#[derive(Clone)]
pub struct ProfilesService {
    repository: Repository,
}

impl ProfilesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Return the identity's profile, creating it on first use.
    ///
    /// Safe to call on every request. If a concurrent call inserts the row
    /// first, the unique violation is absorbed by reading the winner's row.
    pub async fn ensure_profile(&self, identity: &Identity) -> AppResult<Profile> {
        if let Some(profile) = self.repository.profiles.find(identity.id).await? {
            return Ok(profile);
        }

        let new_profile = NewProfile::from(identity);
        match self.repository.profiles.insert(&new_profile).await {
            Ok(profile) => {
                tracing::info!("Created profile for identity {}", identity.id);
                Ok(profile)
            }
            Err(AppError::UniqueViolation(_)) => {
                tracing::debug!("Profile {} created concurrently", identity.id);
                self.repository
                    .profiles
                    .find(identity.id)
                    .await?
                    .ok_or_else(|| AppError::Internal(format!("Profile {} vanished", identity.id)))
            }
            Err(e) => {
                tracing::warn!("Failed to create profile for {}: {}", identity.id, e);
                Err(e)
            }
        }
    }

    /// Profile, own listings, and both request lists of the caller
    pub async fn dashboard(&self, identity: &Identity) -> AppResult<Dashboard> {
        let profile = self.ensure_profile(identity).await?;
        let (books, received, sent) = tokio::try_join!(
            self.repository.books.list_by_owner(identity.id),
            self.repository.requests.list_received(identity.id),
            self.repository.requests.list_sent(identity.id),
        )?;

        Ok(Dashboard {
            profile,
            books,
            received,
            sent,
        })
    }
}
