//! SQLite-backed persistent store.

use super::identity::PartitionId;
use super::traits::{CachePartition, CacheStore, DynPartition};
use crate::config::StorageConfig;
use crate::error::{CacheError, Result};
use crate::response::CachedResponse;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// SQLite-based store backend.
///
/// All partitions share one database. Thread-safe via an internal mutex on
/// the connection; queries run on Tokio's blocking pool.
pub struct SqliteStore {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the specified database path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io_with_path(e, parent))?;
        }

        let conn = Connection::open(db_path).map_err(|e| CacheError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| CacheError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        debug!("Opened cache database at {}", db_path.display());
        Self::from_connection(conn)
    }

    /// Open the store at the platform cache directory
    /// (e.g. `~/.cache/townland/cache.sqlite` on Linux).
    pub fn open_default() -> Result<Self> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            CacheError::Other("Could not determine platform cache directory".to_string())
        })?;
        Self::open(
            cache_dir
                .join(StorageConfig::APP_DIR_NAME)
                .join(StorageConfig::DATABASE_FILENAME),
        )
    }

    /// Create a store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initialize database schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            -- Known partitions
            CREATE TABLE IF NOT EXISTS cache_partitions (
                identity TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            -- Stored responses; seq preserves insertion order
            CREATE TABLE IF NOT EXISTS cache_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                partition TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                size_bytes INTEGER NOT NULL,
                stored_at TEXT NOT NULL,
                UNIQUE (partition, url)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_partition
                ON cache_entries(partition, seq);
            "#,
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }
}

/// Run a closure against the connection on the blocking pool.
async fn with_conn<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock().map_err(|e| CacheError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })?;
        f(&guard)
    })
    .await
    .map_err(|e| CacheError::Other(format!("Database task failed: {}", e)))?
}

fn partition_exists(conn: &Connection, identity: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM cache_partitions WHERE identity = ?1",
            params![identity],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    Ok(exists)
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn open(&self, id: &PartitionId) -> Result<DynPartition> {
        let identity = id.as_str().to_string();
        let created = with_conn(&self.conn, move |conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO cache_partitions (identity, created_at) VALUES (?1, ?2)",
                    params![identity, Utc::now().to_rfc3339()],
                )
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to create partition {}: {}", identity, e),
                    source: Some(e),
                })?;
            Ok(inserted > 0)
        })
        .await?;

        if created {
            debug!("Created cache partition '{}'", id);
        }

        Ok(Arc::new(SqlitePartition {
            id: id.clone(),
            conn: Arc::clone(&self.conn),
        }))
    }

    async fn delete(&self, id: &PartitionId) -> Result<bool> {
        let identity = id.as_str().to_string();
        let (entries, existed) = with_conn(&self.conn, move |conn| {
            let entries = conn
                .execute(
                    "DELETE FROM cache_entries WHERE partition = ?1",
                    params![identity],
                )
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to delete partition entries: {}", e),
                    source: Some(e),
                })?;
            let existed = conn
                .execute(
                    "DELETE FROM cache_partitions WHERE identity = ?1",
                    params![identity],
                )
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to delete partition: {}", e),
                    source: Some(e),
                })?;
            Ok((entries, existed > 0))
        })
        .await?;

        debug!("Deleted partition '{}' ({} entries)", id, entries);
        Ok(existed)
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        with_conn(&self.conn, |conn| {
            let mut stmt = conn
                .prepare("SELECT identity FROM cache_partitions ORDER BY identity")
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to prepare partition query: {}", e),
                    source: Some(e),
                })?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
        .await
    }
}

/// Handle to one partition inside a [`SqliteStore`].
///
/// Writes through a handle whose partition has since been deleted fail with
/// [`CacheError::StoreUnavailable`] instead of leaving orphaned rows.
struct SqlitePartition {
    id: PartitionId,
    conn: Arc<Mutex<Connection>>,
}

#[async_trait]
impl CachePartition for SqlitePartition {
    fn id(&self) -> &PartitionId {
        &self.id
    }

    async fn put(&self, url: &str, response: CachedResponse) -> Result<()> {
        let identity = self.id.as_str().to_string();
        let url = url.to_string();
        let headers = serde_json::to_string(&response.headers)?;

        with_conn(&self.conn, move |conn| {
            if !partition_exists(conn, &identity)? {
                return Err(CacheError::StoreUnavailable { identity });
            }

            conn.execute(
                r#"
                INSERT INTO cache_entries
                (partition, url, status, headers, body, size_bytes, stored_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(partition, url) DO UPDATE SET
                    status = excluded.status,
                    headers = excluded.headers,
                    body = excluded.body,
                    size_bytes = excluded.size_bytes,
                    stored_at = excluded.stored_at
                "#,
                params![
                    identity,
                    url,
                    response.status,
                    headers,
                    &response.body[..],
                    response.body.len() as i64,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| CacheError::Database {
                message: format!("Failed to store {}: {}", url, e),
                source: Some(e),
            })?;
            Ok(())
        })
        .await
    }

    async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>> {
        let identity = self.id.as_str().to_string();
        let url = url.to_string();

        with_conn(&self.conn, move |conn| {
            let row: Option<(i64, String, Vec<u8>)> = conn
                .query_row(
                    r#"
                    SELECT status, headers, body
                    FROM cache_entries
                    WHERE partition = ?1 AND url = ?2
                    "#,
                    params![identity, url],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to query cache entry: {}", e),
                    source: Some(e),
                })?;

            let (status, headers, body) = match row {
                Some(r) => r,
                None => return Ok(None),
            };

            let status = u16::try_from(status).map_err(|_| CacheError::Database {
                message: format!("Invalid status {} stored for {}", status, url),
                source: None,
            })?;

            Ok(Some(CachedResponse {
                url,
                status,
                headers: serde_json::from_str(&headers)?,
                body: body.into(),
            }))
        })
        .await
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        let identity = self.id.as_str().to_string();
        let url = url.to_string();

        with_conn(&self.conn, move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM cache_entries WHERE partition = ?1 AND url = ?2",
                    params![identity, url],
                )
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to delete cache entry: {}", e),
                    source: Some(e),
                })?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let identity = self.id.as_str().to_string();

        with_conn(&self.conn, move |conn| {
            let mut stmt = conn
                .prepare("SELECT url FROM cache_entries WHERE partition = ?1 ORDER BY seq")
                .map_err(|e| CacheError::Database {
                    message: format!("Failed to prepare keys query: {}", e),
                    source: Some(e),
                })?;
            let keys = stmt
                .query_map(params![identity], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
        .await
    }
}
