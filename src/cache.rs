//! Persistent change cache.
//!
//! Maps each processed file's canonical path to the modification time it had
//! when it was last processed successfully. The layout is a single table:
//!
//! ```sql
//! CREATE TABLE files (
//!     path TEXT PRIMARY KEY,
//!     last_edit_time INTEGER
//! )
//! ```
//!
//! A [`ChangeCache`] is the only handle to the store. It is acquired with
//! [`ChangeCache::open`] and released with [`ChangeCache::close`]; dropping the
//! handle on an early return or error also releases the connection.
//!
//! Staleness is decided by [`is_changed`]: a file is changed iff its current
//! mtime is strictly greater than the recorded one. A file touched twice within
//! the same second, or whose mtime moves backwards, is reported unchanged.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Failure to open, read, or write the cache store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot prepare cache location {path}: {source}")]
    Location {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("incompatible cache schema: {0}")]
    IncompatibleSchema(String),
}

/// Whether a file needs reprocessing given its current and recorded mtimes.
pub fn is_changed(current_modified_time: i64, last_seen_modified_time: i64) -> bool {
    current_modified_time > last_seen_modified_time
}

/// Handle to an open change cache.
pub struct ChangeCache {
    pool: SqlitePool,
}

impl ChangeCache {
    /// Open or create the cache database at `path`, creating its parent
    /// directory and the `files` table as needed.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StorageError::Location {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let cache = Self::connect(options).await?;
        tracing::debug!(path = %path.display(), "opened change cache");
        Ok(cache)
    }

    /// Open a private, non-persistent cache. Used by tests.
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, StorageError> {
        // One connection: the cache is used sequentially, and an in-memory
        // database only exists on the connection that created it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                last_edit_time INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('files')")
            .fetch_all(&self.pool)
            .await?;

        for required in ["path", "last_edit_time"] {
            if !columns.iter().any(|c| c == required) {
                return Err(StorageError::IncompatibleSchema(format!(
                    "table 'files' has no '{}' column (found: {})",
                    required,
                    columns.join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Recorded modification time for `path`, or `0` if it was never recorded.
    pub async fn get_last_seen(&self, path: &Path) -> Result<i64, StorageError> {
        let recorded: Option<Option<i64>> =
            sqlx::query_scalar("SELECT last_edit_time FROM files WHERE path = ?")
                .bind(path_key(path))
                .fetch_optional(&self.pool)
                .await?;

        Ok(recorded.flatten().unwrap_or(0))
    }

    /// Record that `path` was processed at `modified_time`, replacing any
    /// existing entry.
    ///
    /// Runs in its own transaction. Callers only record files that
    /// [`is_changed`] reported, so the stored time never moves backwards.
    pub async fn record_seen(&self, path: &Path, modified_time: i64) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR REPLACE INTO files (path, last_edit_time) VALUES (?, ?)")
            .bind(path_key(path))
            .bind(modified_time)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(path = %path.display(), modified_time, "recorded file as seen");
        Ok(())
    }

    /// Number of tracked files.
    pub async fn len(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Whether no file has been recorded yet.
    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// Release the underlying connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
