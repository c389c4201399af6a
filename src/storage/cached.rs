use crate::models::Link;
use crate::storage::{LinkStore, LookupMetadata, LookupResult, StorageResult};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of a link registry.
///
/// Lookups by short code (including misses) are cached for the redirect hot
/// path. Cached links carry the click counter as of the time they were
/// cached, so counter reads should go through `list_by_owner`, which always
/// hits the underlying store. Counter increments are passed straight through.
pub struct CachedLinkStore {
    inner: Arc<dyn LinkStore>,
    read_cache: Cache<String, Option<Link>>,
}

impl CachedLinkStore {
    pub fn new(inner: Arc<dyn LinkStore>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, read_cache }
    }

    async fn invalidate_cache(&self, short_code: &str) {
        self.read_cache.invalidate(short_code).await;
    }
}

#[async_trait]
impl LinkStore for CachedLinkStore {
    async fn create_with_code(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
        name: Option<&str>,
    ) -> StorageResult<Link> {
        let link = self
            .inner
            .create_with_code(short_code, destination_url, owner_id, name)
            .await?;

        // Replaces a cached miss for this code, if any
        self.read_cache
            .insert(short_code.to_string(), Some(link.clone()))
            .await;

        Ok(link)
    }

    async fn find_by_code(&self, short_code: &str) -> StorageResult<Option<Link>> {
        Ok(self.find_by_code_with_metadata(short_code).await?.link)
    }

    async fn find_by_code_with_metadata(&self, short_code: &str) -> StorageResult<LookupResult> {
        if let Some(cached) = self.read_cache.get(short_code).await {
            return Ok(LookupResult {
                link: cached,
                metadata: LookupMetadata { cache_hit: true },
            });
        }

        let link = self.inner.find_by_code(short_code).await?;

        self.read_cache
            .insert(short_code.to_string(), link.clone())
            .await;

        Ok(LookupResult {
            link,
            metadata: LookupMetadata { cache_hit: false },
        })
    }

    async fn increment_clicks(&self, link_id: i64) -> StorageResult<()> {
        self.inner.increment_clicks(link_id).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<Link>> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn delete(&self, owner_id: &str, short_code: &str) -> StorageResult<bool> {
        let deleted = self.inner.delete(owner_id, short_code).await?;

        if deleted {
            self.invalidate_cache(short_code).await;
        }

        Ok(deleted)
    }
}
