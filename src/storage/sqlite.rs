use crate::models::{ClickEvent, ClickEventRow, Fingerprint, Link, NewClickEvent};
use crate::storage::{
    ClickStore, LinkStore, StorageBackend, StorageError, StorageResult, TimeRange,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit
const LINK_ID_CHUNK: usize = 500;

const LINK_COLUMNS: &str = "id, short_code, destination_url, owner_id, name, created_at, clicks";

const EVENT_COLUMNS: &str = "id, link_id, ip_address, user_agent, clicked_at, device_type, \
                             browser, os, country, city, referrer, referrer_category";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT NOT NULL UNIQUE,
                destination_url TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                name TEXT,
                created_at INTEGER NOT NULL,
                clicks INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                clicked_at INTEGER NOT NULL,
                device_type TEXT NOT NULL,
                browser TEXT NOT NULL DEFAULT 'Unknown',
                os TEXT NOT NULL DEFAULT 'Unknown',
                country TEXT NOT NULL DEFAULT 'Unknown',
                city TEXT NOT NULL DEFAULT 'Unknown',
                referrer TEXT NOT NULL DEFAULT '',
                referrer_category TEXT NOT NULL DEFAULT 'Direct'
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        // Serves the deduplication window query
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_click_events_dedup
            ON click_events(link_id, ip_address, user_agent, clicked_at)
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_click_events_link_time ON click_events(link_id, clicked_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LinkStore for SqliteStorage {
    async fn create_with_code(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
        name: Option<&str>,
    ) -> StorageResult<Link> {
        let created_at = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO links (short_code, destination_url, owner_id, name, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(short_code) DO NOTHING
            "#,
        )
        .bind(short_code)
        .bind(destination_url)
        .bind(owner_id)
        .bind(name)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = ?"
        ))
        .bind(result.last_insert_rowid())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_by_code(&self, short_code: &str) -> StorageResult<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = ?"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn increment_clicks(&self, link_id: i64) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET clicks = clicks + 1
            WHERE id = ?
            "#,
        )
        .bind(link_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn delete(&self, owner_id: &str, short_code: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM links WHERE owner_id = ? AND short_code = ?")
            .bind(owner_id)
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ClickStore for SqliteStorage {
    async fn exists_since(
        &self,
        link_id: i64,
        fingerprint: &Fingerprint,
        since: i64,
        until: i64,
    ) -> StorageResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM click_events
                WHERE link_id = ?
                  AND ip_address = ?
                  AND user_agent = ?
                  AND clicked_at >= ?
                  AND clicked_at <= ?
            )
            "#,
        )
        .bind(link_id)
        .bind(&fingerprint.ip_address)
        .bind(&fingerprint.user_agent)
        .bind(since)
        .bind(until)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(found != 0)
    }

    async fn insert(&self, event: &NewClickEvent) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO click_events (
                link_id, ip_address, user_agent, clicked_at, device_type,
                browser, os, country, city, referrer, referrer_category
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.link_id)
        .bind(&event.fingerprint.ip_address)
        .bind(&event.fingerprint.user_agent)
        .bind(event.clicked_at)
        .bind(event.device_type.as_str())
        .bind(&event.browser)
        .bind(&event.os)
        .bind(&event.country)
        .bind(&event.city)
        .bind(&event.referrer)
        .bind(event.referrer_category.as_str())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn events_for_links(
        &self,
        link_ids: &[i64],
        range: TimeRange,
    ) -> StorageResult<Vec<ClickEvent>> {
        let mut events = Vec::new();

        for chunk in link_ids.chunks(LINK_ID_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {EVENT_COLUMNS} FROM click_events WHERE link_id IN ("
            ));
            let mut ids = query.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");

            if let Some(start) = range.start {
                query.push(" AND clicked_at >= ").push_bind(start);
            }
            if let Some(end) = range.end {
                query.push(" AND clicked_at <= ").push_bind(end);
            }

            let rows = query
                .build_query_as::<ClickEventRow>()
                .fetch_all(self.pool.as_ref())
                .await?;
            events.extend(rows.into_iter().map(ClickEvent::from));
        }

        events.sort_by_key(|event| (event.clicked_at, event.id));
        Ok(events)
    }
}
