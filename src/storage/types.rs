use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Checkpoint store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing table does not exist yet. Callers may provision it and retry once.
    #[error("Checkpoint table '{table}' does not exist")]
    CollectionMissing { table: String },

    /// A record or checkpoint could not be written
    #[error("Failed to write to checkpoint store: {0}")]
    Write(String),

    /// Another process holds the database lock
    #[error("Checkpoint database is locked by another process")]
    Locked,

    /// Table names are interpolated into SQL, so only plain identifiers are accepted
    #[error("Invalid table name '{0}': use letters, digits and underscores only")]
    InvalidTableName(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error raised while reading from `table`.
    pub(crate) fn from_sqlx(err: sqlx::Error, table: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.message().contains("no such table") {
                return StoreError::CollectionMissing {
                    table: table.to_string(),
                };
            }
        }

        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6). SQLITE_CANTOPEN (14) is a path or
        // permission problem, not contention, and stays `Other`.
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StoreError::Locked;
        }

        StoreError::Other(err)
    }

    /// Classify a sqlx error raised while writing to `table`.
    ///
    /// A missing table and lock contention keep their own variants; everything
    /// else surfaces as [`StoreError::Write`].
    pub(crate) fn from_sqlx_write(err: sqlx::Error, table: &str) -> Self {
        match Self::from_sqlx(err, table) {
            StoreError::Other(e) => StoreError::Write(e.to_string()),
            other => other,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Reserved `entry_id` under which a feed's checkpoint row is stored.
pub const CHECKPOINT_KEY: &str = "0";

/// Last-modified marker for a feed, used as the conditional-fetch hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCheckpoint {
    pub feed_url: String,
    /// Opaque value echoed back to the server (HTTP `Last-Modified` verbatim).
    pub modified: String,
}

/// Proof that an entry was posted for a feed. Existence is the dedup signal.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeliveredEntryRecord {
    pub feed_url: String,
    pub entry_id: String,
    /// RFC 3339, empty when the feed gave no date
    pub published: String,
    pub title: String,
    pub link: String,
}
