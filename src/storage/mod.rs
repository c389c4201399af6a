pub mod cached;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedLinkStore;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{
    ClickStore, LinkStore, LookupMetadata, LookupResult, StorageBackend, StorageError,
    StorageResult, TimeRange,
};

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::{CacheConfig, DatabaseBackend, DatabaseConfig};

/// The process-wide persistence handle.
///
/// One connection pool backs both the link registry and the click event
/// store. Created once at startup, initialised with `init`, and closed with
/// `close` during shutdown; components receive the store handles they need.
#[derive(Clone)]
pub struct Stores {
    pub links: Arc<dyn LinkStore>,
    pub clicks: Arc<dyn ClickStore>,
    backend: Arc<dyn StorageBackend>,
}

impl Stores {
    /// Wrap a backend that implements both stores
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: LinkStore + ClickStore + StorageBackend + 'static,
    {
        Self {
            links: backend.clone(),
            clicks: backend.clone(),
            backend,
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let stores = match config.backend {
            DatabaseBackend::Sqlite => {
                info!("Using SQLite storage: {}", config.url);
                Self::from_backend(Arc::new(
                    SqliteStorage::new(&config.url, config.max_connections).await?,
                ))
            }
            DatabaseBackend::Postgres => {
                info!("Using PostgreSQL storage");
                Self::from_backend(Arc::new(
                    PostgresStorage::new(&config.url, config.max_connections).await?,
                ))
            }
        };
        Ok(stores)
    }

    /// Put a lookup cache in front of the link registry
    pub fn with_link_cache(mut self, cache: &CacheConfig) -> Self {
        self.links = Arc::new(CachedLinkStore::new(
            self.links,
            cache.max_entries,
            cache.ttl_secs,
        ));
        self
    }

    pub async fn init(&self) -> Result<()> {
        self.backend.init().await
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}
