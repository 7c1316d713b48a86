//! External book metadata lookup (Google Books volumes API)

use std::time::Duration;

use serde::Deserialize;

use crate::{
    config::LookupConfig,
    error::{AppError, AppResult},
    models::{book::map_external_category, ExternalBook},
};

use super::redis::RedisService;

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(rename = "imageLinks", default)]
    image_links: Option<ImageLinks>,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageLinks {
    #[serde(default)]
    thumbnail: Option<String>,
}

/// First candidate of a volumes response, mapped onto a listing
fn first_candidate(response: VolumesResponse) -> Option<ExternalBook> {
    let info = response.items.into_iter().next()?.volume_info;
    let raw_category = info.categories.first().map(String::as_str).unwrap_or("");

    Some(ExternalBook {
        title: info.title.unwrap_or_default(),
        author: info.authors.into_iter().next().unwrap_or_default(),
        cover_url: info
            .image_links
            .and_then(|links| links.thumbnail)
            .map(|url| url.replacen("http:", "https:", 1)),
        category: map_external_category(raw_category),
    })
}

#[derive(Clone)]
pub struct BookLookupService {
    http: reqwest::Client,
    base_url: String,
    cache: Option<RedisService>,
    cache_ttl_seconds: u64,
}

impl BookLookupService {
    pub fn new(config: &LookupConfig, cache: Option<RedisService>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            cache,
            cache_ttl_seconds: config.cache_ttl_seconds,
        })
    }

    /// Look up listing details by free text.
    ///
    /// Returns `None` when nothing matched or the index could not be reached.
    pub async fn search(&self, query: &str) -> AppResult<Option<ExternalBook>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Search query is required".to_string()));
        }

        let cache_key = format!("lookup:books:{}", query.to_lowercase());
        if let Some(ref cache) = self.cache {
            match cache.get_json::<Option<ExternalBook>>(&cache_key).await {
                Ok(Some(cached)) => {
                    tracing::debug!("Lookup cache hit for '{}'", query);
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Lookup cache read failed: {}", e),
            }
        }

        let response = match self.fetch(query).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Book lookup for '{}' failed: {}", query, e);
                return Ok(None);
            }
        };

        let found = first_candidate(response);
        tracing::info!(
            "Book lookup for '{}': {}",
            query,
            if found.is_some() { "found" } else { "no match" }
        );

        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.set_json(&cache_key, &found, self.cache_ttl_seconds).await {
                tracing::warn!("Lookup cache write failed: {}", e);
            }
        }

        Ok(found)
    }

    async fn fetch(&self, query: &str) -> reqwest::Result<VolumesResponse> {
        self.http
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .json::<VolumesResponse>()
            .await
    }
}
