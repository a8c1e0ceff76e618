//! SQLite document store implementation.
//!
//! Features:
//! - WAL mode for concurrent readers
//! - One row per document, fields stored as JSON text
//! - Merge writes and field updates run as read-modify-write inside a
//!   transaction, so each call is atomic for its document
//!
//! Write transactions take the database write lock before reading, so
//! concurrent writers queue on `busy_timeout` instead of failing with
//! `SQLITE_BUSY` on lock upgrade. If the timeout still expires the call
//! returns [`RecordError::Database`], which [`RecordError::is_retryable`]
//! reports as retryable.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::error::{RecordError, Result};
use crate::path::{self, validate_path};
use crate::store::{
    apply_updates, generate_id, merge_fields, AllocatedId, Document, DocumentStore, FieldUpdates,
    Fields,
};

/// SQLite implementation of DocumentStore.
///
/// Uses WAL mode for performance and durability.
pub struct SqliteStore {
    pool: SqlitePool,
    root_scope: String,
}

impl SqliteStore {
    /// Open or create a SQLite store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SQLite document store at {:?}", path);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| RecordError::StoreUnavailable(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| RecordError::StoreUnavailable(e.to_string()))?;

        let store = Self {
            pool,
            root_scope: String::new(),
        };

        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RecordError::StoreUnavailable(e.to_string()))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| RecordError::StoreUnavailable(e.to_string()))?;

        let store = Self {
            pool,
            root_scope: String::new(),
        };

        store.init_schema().await?;
        Ok(store)
    }

    /// Set the root scope reported to the record layer.
    pub fn with_root_scope(mut self, root_scope: impl Into<String>) -> Self {
        self.root_scope = root_scope.into();
        self
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY NOT NULL,
                fields TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema initialized");
        Ok(())
    }

    /// Get current Unix timestamp.
    fn now_unix() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    /// Convert Unix timestamp to SystemTime.
    fn unix_to_system_time(unix: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(unix.max(0) as u64)
    }

    fn decode_fields(raw: &str) -> Result<Fields> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Begin a transaction that already holds the write lock.
    ///
    /// `BEGIN` is deferred; the no-op write promotes it before any read
    /// snapshot exists, so waiting writers go through the busy handler.
    async fn begin_write(&self) -> Result<sqlx::Transaction<'_, sqlx::Sqlite>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE documents SET path = path WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn root_scope(&self) -> String {
        self.root_scope.clone()
    }

    async fn get(&self, address: &str) -> Result<Option<Document>> {
        validate_path(address)?;

        let row: Option<(String, String, i64, i64)> = sqlx::query_as(
            "SELECT path, fields, created_at, updated_at FROM documents WHERE path = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(path, fields, created_at, updated_at)| -> Result<Document> {
            Ok(Document {
                path,
                fields: Self::decode_fields(&fields)?,
                created_at: Self::unix_to_system_time(created_at),
                updated_at: Self::unix_to_system_time(updated_at),
            })
        })
        .transpose()
    }

    async fn write(&self, address: &str, data: &Fields, merge: bool) -> Result<()> {
        validate_path(address)?;

        let now = Self::now_unix();
        let mut tx = self.begin_write().await?;

        let fields = if merge {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT fields FROM documents WHERE path = ?")
                    .bind(address)
                    .fetch_optional(&mut *tx)
                    .await?;
            match row {
                Some((raw,)) => {
                    let mut stored = Self::decode_fields(&raw)?;
                    merge_fields(&mut stored, data);
                    stored
                }
                None => data.clone(),
            }
        } else {
            data.clone()
        };
        let encoded = serde_json::to_string(&fields)?;

        sqlx::query(
            r#"
            INSERT INTO documents (path, fields, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                fields = excluded.fields,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(address)
        .bind(&encoded)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("Wrote document {} (merge: {})", address, merge);
        Ok(())
    }

    async fn update(&self, address: &str, updates: FieldUpdates) -> Result<()> {
        validate_path(address)?;

        let mut tx = self.begin_write().await?;

        let row: Option<(String,)> = sqlx::query_as("SELECT fields FROM documents WHERE path = ?")
            .bind(address)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((raw,)) = row else {
            return Err(RecordError::DocumentNotFound(address.to_string()));
        };

        let mut fields = Self::decode_fields(&raw)?;
        apply_updates(&mut fields, updates);
        let encoded = serde_json::to_string(&fields)?;

        sqlx::query("UPDATE documents SET fields = ?, updated_at = ? WHERE path = ?")
            .bind(&encoded)
            .bind(Self::now_unix())
            .bind(address)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!("Updated document {}", address);
        Ok(())
    }

    async fn delete(&self, address: &str) -> Result<()> {
        validate_path(address)?;

        sqlx::query("DELETE FROM documents WHERE path = ?")
            .bind(address)
            .execute(&self.pool)
            .await?;

        debug!("Deleted document {}", address);
        Ok(())
    }

    async fn allocate_id(&self, collection_address: &str) -> Result<AllocatedId> {
        validate_path(collection_address)?;

        loop {
            let id = generate_id();
            let address = path::join(collection_address, &id);
            if !self.exists(&address).await? {
                return Ok(AllocatedId { id, address });
            }
        }
    }
}
