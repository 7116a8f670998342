use chrono::{DateTime, SecondsFormat, Utc};
use futures::{future::BoxFuture, FutureExt};
use sqlx::sqlite::SqlitePool;
use thiserror::Error;

use crate::domain::{Post, RefreshRecord};

pub const POSTS_KEY: &str = "posts";
pub const LAST_REFRESH_KEY: &str = "lastRefresh";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failed: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("stored posts could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("stored refresh time is not a valid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Persistent home of the seen-post history and the last refresh time.
pub trait HistoryStore: Send + Sync {
    fn load_posts(&self) -> BoxFuture<'_, Result<Vec<Post>, StoreError>>;

    fn save_posts<'a>(&'a self, posts: &'a [Post]) -> BoxFuture<'a, Result<(), StoreError>>;

    fn load_refresh(&self) -> BoxFuture<'_, Result<RefreshRecord, StoreError>>;

    fn save_last_refresh(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Key-value table with one JSON row per logical key.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = sqlx::query_scalar(r#"SELECT value FROM kv_store WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_posts(&self) -> BoxFuture<'_, Result<Vec<Post>, StoreError>> {
        async move {
            match self.get(POSTS_KEY).await? {
                Some(raw) => Ok(serde_json::from_str(&raw)?),
                None => Ok(Vec::new()),
            }
        }
        .boxed()
    }

    fn save_posts<'a>(&'a self, posts: &'a [Post]) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            let raw = serde_json::to_string(posts)?;
            self.set(POSTS_KEY, &raw).await?;
            tracing::debug!(target: "db", count = posts.len(), "posts stored");
            Ok(())
        }
        .boxed()
    }

    fn load_refresh(&self) -> BoxFuture<'_, Result<RefreshRecord, StoreError>> {
        async move {
            let last_refresh = match self.get(LAST_REFRESH_KEY).await? {
                Some(raw) => Some(DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc)),
                None => None,
            };
            Ok(RefreshRecord { last_refresh })
        }
        .boxed()
    }

    fn save_last_refresh(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<(), StoreError>> {
        async move {
            let raw = at.to_rfc3339_opts(SecondsFormat::Millis, true);
            self.set(LAST_REFRESH_KEY, &raw).await
        }
        .boxed()
    }
}
