use crate::models::{ClickEvent, ClickEventRow, Fingerprint, Link, NewClickEvent};
use crate::storage::{
    ClickStore, LinkStore, StorageBackend, StorageError, StorageResult, TimeRange,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

const LINK_COLUMNS: &str = "id, short_code, destination_url, owner_id, name, created_at, clicks";

const EVENT_COLUMNS: &str = "id, link_id, ip_address, user_agent, clicked_at, device_type, \
                             browser, os, country, city, referrer, referrer_category";

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl StorageBackend for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                destination_url TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                name TEXT,
                created_at BIGINT NOT NULL,
                clicks BIGINT NOT NULL DEFAULT 0
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
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                clicked_at BIGINT NOT NULL,
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
            ON click_events(link_id, ip_address, user_agent, clicked_at DESC)
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
impl LinkStore for PostgresStorage {
    async fn create_with_code(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
        name: Option<&str>,
    ) -> StorageResult<Link> {
        let created_at = chrono::Utc::now().timestamp();

        let link = sqlx::query_as::<_, Link>(&format!(
            r#"
            INSERT INTO links (short_code, destination_url, owner_id, name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (short_code) DO NOTHING
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(short_code)
        .bind(destination_url)
        .bind(owner_id)
        .bind(name)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::Conflict)
    }

    async fn find_by_code(&self, short_code: &str) -> StorageResult<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = $1"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn increment_clicks(&self, link_id: i64) -> StorageResult<()> {
        sqlx::query("UPDATE links SET clicks = clicks + 1 WHERE id = $1")
            .bind(link_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> StorageResult<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn delete(&self, owner_id: &str, short_code: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM links WHERE owner_id = $1 AND short_code = $2")
            .bind(owner_id)
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ClickStore for PostgresStorage {
    async fn exists_since(
        &self,
        link_id: i64,
        fingerprint: &Fingerprint,
        since: i64,
        until: i64,
    ) -> StorageResult<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM click_events
                WHERE link_id = $1
                  AND ip_address = $2
                  AND user_agent = $3
                  AND clicked_at >= $4
                  AND clicked_at <= $5
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

        Ok(found)
    }

    async fn insert(&self, event: &NewClickEvent) -> StorageResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO click_events (
                link_id, ip_address, user_agent, clicked_at, device_type,
                browser, os, country, city, referrer, referrer_category
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
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
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn events_for_links(
        &self,
        link_ids: &[i64],
        range: TimeRange,
    ) -> StorageResult<Vec<ClickEvent>> {
        if link_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ClickEventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM click_events
            WHERE link_id = ANY($1)
              AND ($2::BIGINT IS NULL OR clicked_at >= $2)
              AND ($3::BIGINT IS NULL OR clicked_at <= $3)
            ORDER BY clicked_at ASC, id ASC
            "#
        ))
        .bind(link_ids)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ClickEvent::from).collect())
    }
}
