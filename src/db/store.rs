//! # Document Store
//!
//! JSON documents grouped into named collections and addressed by string id.
//! The rest of the application only sees the [`DocumentStore`] trait; the
//! process-wide instance lives in `AppState` as an `Arc<dyn DocumentStore>`.
//!
//! The production implementation keeps every collection in one SQLite table
//! (see `migrations/`). Each write replaces a whole document, so per-document
//! atomicity is all the consistency the store offers.

use crate::error::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Collection names shared by the repositories and the session adapter.
pub mod collections {
    pub const SESSIONS: &str = "sessions";
    pub const USERS: &str = "users";
    pub const COURSES: &str = "courses";
    pub const ORDERS: &str = "orders";
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Round-trip to the backend. Bootstrap refuses to listen if this fails.
    async fn ping(&self) -> AppResult<()>;

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Value>>;

    /// Every document of a collection, oldest first.
    async fn find_all(&self, collection: &str) -> AppResult<Vec<Value>>;

    /// Documents whose top-level string field `field` equals `value`.
    async fn find_by_field(&self, collection: &str, field: &str, value: &str)
        -> AppResult<Vec<Value>>;

    /// Insert or replace. `expires_at` is a unix timestamp used by
    /// [`DocumentStore::delete_expired`].
    async fn save(
        &self,
        collection: &str,
        id: &str,
        body: &Value,
        expires_at: Option<i64>,
    ) -> AppResult<()>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<bool>;

    /// Removes documents whose `expires_at` lies before `now`; returns the count.
    async fn delete_expired(&self, collection: &str, now: i64) -> AppResult<u64>;
}

/// SQLite-backed store
///
/// `SqlitePool` is already a cheap, clone-able handle, so the struct itself
/// carries no extra synchronisation.
#[derive(Clone, Debug)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = SqlitePool::connect(url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self, collection: &str) -> AppResult<Vec<Value>> {
        let rows = sqlx::query("SELECT body FROM documents WHERE collection = ? ORDER BY rowid")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        decode_bodies(rows)
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> AppResult<Vec<Value>> {
        let rows = sqlx::query(
            "SELECT body FROM documents
             WHERE collection = ? AND json_extract(body, '$.' || ?) = ?
             ORDER BY rowid",
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        decode_bodies(rows)
    }

    async fn save(
        &self,
        collection: &str,
        id: &str,
        body: &Value,
        expires_at: Option<i64>,
    ) -> AppResult<()> {
        let body = serde_json::to_string(body)?;

        sqlx::query(
            "INSERT INTO documents (collection, id, body, expires_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE
             SET body = excluded.body, expires_at = excluded.expires_at",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, collection: &str, now: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE collection = ? AND expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(collection)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn decode_bodies(rows: Vec<sqlx::sqlite::SqliteRow>) -> AppResult<Vec<Value>> {
    rows.iter()
        .map(|row| -> AppResult<Value> {
            let body: String = row.try_get("body")?;
            Ok(serde_json::from_str(&body)?)
        })
        .collect()
}
