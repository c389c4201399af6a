use crate::models::{ClickEvent, Fingerprint, Link, NewClickEvent};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Inclusive time bounds in unix seconds; `None` leaves a side open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start.is_none_or(|s| ts >= s) && self.end.is_none_or(|e| ts <= e)
    }
}

/// Extra information about how a lookup was served
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupMetadata {
    pub cache_hit: bool,
}

#[derive(Debug, Clone)]
pub struct LookupResult {
    pub link: Option<Link>,
    pub metadata: LookupMetadata,
}

/// Link registry: short code → destination + owner, plus the click counter
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Create a link under a caller-provided short code.
    /// Returns `StorageError::Conflict` if the code is taken.
    async fn create_with_code(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
        name: Option<&str>,
    ) -> StorageResult<Link>;

    /// Exact-match lookup by short code
    async fn find_by_code(&self, short_code: &str) -> StorageResult<Option<Link>>;

    /// Lookup that also reports whether it was answered from a cache
    async fn find_by_code_with_metadata(&self, short_code: &str) -> StorageResult<LookupResult> {
        let link = self.find_by_code(short_code).await?;
        Ok(LookupResult {
            link,
            metadata: LookupMetadata::default(),
        })
    }

    /// Atomically add one to the link's click counter
    async fn increment_clicks(&self, link_id: i64) -> StorageResult<()>;

    /// All links of an owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<Link>>;

    /// Delete an owner's link. Returns false when the owner has no such code.
    async fn delete(&self, owner_id: &str, short_code: &str) -> StorageResult<bool>;
}

/// Append-only click event log
#[async_trait]
pub trait ClickStore: Send + Sync {
    /// Whether an event exists for (link, fingerprint) with
    /// `since <= clicked_at <= until`
    async fn exists_since(
        &self,
        link_id: i64,
        fingerprint: &Fingerprint,
        since: i64,
        until: i64,
    ) -> StorageResult<bool>;

    /// Append an event, returning its id
    async fn insert(&self, event: &NewClickEvent) -> StorageResult<i64>;

    /// Events of the given links inside `range`, oldest first
    async fn events_for_links(
        &self,
        link_ids: &[i64],
        range: TimeRange,
    ) -> StorageResult<Vec<ClickEvent>>;
}

/// Lifecycle of the shared persistence handle
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create tables and indexes
    async fn init(&self) -> anyhow::Result<()>;

    /// Close the connection pool
    async fn close(&self);
}
