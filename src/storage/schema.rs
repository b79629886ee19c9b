use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StoreError;

/// Table used when the caller does not pick one.
pub const DEFAULT_TABLE: &str = "rssfeeder";

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed checkpoint store.
///
/// One table holds every feed: delivered entries and the per-feed checkpoint
/// row share the `(rssurl, feedid)` primary key.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    pub(crate) table: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open a database connection without touching the schema.
    ///
    /// The table is only created by [`provision`](crate::storage::CheckpointStore::provision),
    /// so a fresh database reports [`StoreError::CollectionMissing`] on first read.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidTableName` if `table` is not a plain SQL identifier,
    /// `StoreError::Locked` if another process holds the database lock,
    /// and `StoreError::Other` for other connection failures.
    pub async fn open(path: &str, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        let in_memory = path == ":memory:";
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file owner-only before SQLite does, so it never exists with umask permissions
        #[cfg(unix)]
        if !in_memory {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                if let Some(parent) = db_path.parent().filter(|p| p.exists()) {
                    tracing::debug!(path = %path, parent = %parent.display(), "Creating database file");
                    // If creation fails, SQLite reports the error at connect_with.
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok();
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StoreError::from_sqlx(e, table))?
            .pragma("busy_timeout", "5000");

        // An in-memory database lives only as long as its connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(2)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::from_sqlx(e, table))?;

        tracing::debug!(path = %path, table = %table, "Opened checkpoint database");

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Name of the table backing this store.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the checkpoint table inside a transaction.
    ///
    /// Idempotent: an existing table is left as is.
    pub(crate) async fn create_table(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                rssurl TEXT NOT NULL,
                feedid TEXT NOT NULL,
                published TEXT NOT NULL DEFAULT '',
                title TEXT,
                link TEXT,
                recorded_at INTEGER NOT NULL,
                PRIMARY KEY (rssurl, feedid)
            )
        "#,
            self.table
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_sqlx_write(e, &self.table))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::from_sqlx_write(e, &self.table))?;

        Ok(())
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*`, at most 64 characters.
pub(crate) fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && table.len() <= 64
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}
