//! Persistent TTL cache for response bodies.
//!
//! Bodies are keyed by exact URL text and stored in SQLite, so a rerun
//! within the TTL reuses pages fetched by the previous run. The pool lets
//! concurrent workers read and write without extra locking.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS responses (
    url        TEXT PRIMARY KEY,
    body       TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
)";

pub struct ResponseCache {
    pool: SqlitePool,
    ttl_secs: i64,
}

impl ResponseCache {
    /// Open (or create) a cache file.
    pub async fn open(path: &Path, ttl: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open response cache: {}", path.display()))?;

        let cache = Self::init(pool, ttl).await?;
        info!(path = %path.display(), ttl_secs = cache.ttl_secs, "Response cache opened");
        Ok(cache)
    }

    /// A cache that lives only as long as this process.
    pub async fn in_memory(ttl: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory SQLite URL")?;

        // A single long-lived connection, or the in-memory database vanishes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory response cache")?;

        Self::init(pool, ttl).await
    }

    async fn init(pool: SqlitePool, ttl: Duration) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create response cache schema")?;
        Ok(Self {
            pool,
            ttl_secs: ttl.as_secs() as i64,
        })
    }

    /// Cached body for `url`, if present and younger than the TTL.
    /// Storage errors count as a miss.
    pub async fn get(&self, url: &str) -> Option<String> {
        self.get_at(url, Utc::now().timestamp()).await
    }

    async fn get_at(&self, url: &str, now: i64) -> Option<String> {
        let row = sqlx::query("SELECT body, fetched_at FROM responses WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(Some(row)) => {
                let fetched_at: i64 = row.try_get("fetched_at").ok()?;
                if now - fetched_at < self.ttl_secs {
                    row.try_get("body").ok()
                } else {
                    debug!(url, "Cached response expired");
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(url, error = %e, "Response cache read failed");
                None
            }
        }
    }

    /// Store a body. Storage errors are logged, never returned.
    pub async fn put(&self, url: &str, body: &str) {
        self.put_at(url, body, Utc::now().timestamp()).await
    }

    async fn put_at(&self, url: &str, body: &str, now: i64) {
        let result = sqlx::query(
            "INSERT INTO responses (url, body, fetched_at) VALUES (?, ?, ?)
             ON CONFLICT(url) DO UPDATE SET body = excluded.body, fetched_at = excluded.fetched_at",
        )
        .bind(url)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(url, error = %e, "Response cache write failed");
        }
    }

    /// Remove expired entries. Returns how many were dropped.
    pub async fn evict_expired(&self) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - self.ttl_secs;
        let result = sqlx::query("DELETE FROM responses WHERE fetched_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to evict expired cache entries")?;
        Ok(result.rows_affected())
    }

    pub async fn len(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM responses")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count cache entries")?;
        Ok(row.try_get("n")?)
    }
}
