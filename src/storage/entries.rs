use super::schema::Database;
use super::store::CheckpointStore;
use super::types::{DeliveredEntryRecord, FeedCheckpoint, StoreError, CHECKPOINT_KEY};

impl CheckpointStore for Database {
    async fn get_checkpoint(&self, feed_url: &str) -> Result<Option<FeedCheckpoint>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT published FROM {} WHERE rssurl = ? AND feedid = ?",
            self.table
        ))
        .bind(feed_url)
        .bind(CHECKPOINT_KEY)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, &self.table))?;

        Ok(row.map(|(modified,)| FeedCheckpoint {
            feed_url: feed_url.to_string(),
            modified,
        }))
    }

    async fn is_delivered(&self, feed_url: &str, entry_id: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT 1 FROM {} WHERE rssurl = ? AND feedid = ?",
            self.table
        ))
        .bind(feed_url)
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, &self.table))?;

        Ok(row.is_some())
    }

    async fn record_delivery(&self, record: &DeliveredEntryRecord) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();

        // Records are never rewritten: a second delivery of the same id is a no-op
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (rssurl, feedid, published, title, link, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(rssurl, feedid) DO NOTHING
        "#,
            self.table
        ))
        .bind(&record.feed_url)
        .bind(&record.entry_id)
        .bind(&record.published)
        .bind(&record.title)
        .bind(&record.link)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx_write(e, &self.table))?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                feed = %record.feed_url,
                entry_id = %record.entry_id,
                "Delivery already recorded"
            );
        }

        Ok(())
    }

    async fn put_checkpoint(&self, checkpoint: &FeedCheckpoint) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (rssurl, feedid, published, recorded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(rssurl, feedid) DO UPDATE SET
                published = excluded.published,
                recorded_at = excluded.recorded_at
        "#,
            self.table
        ))
        .bind(&checkpoint.feed_url)
        .bind(CHECKPOINT_KEY)
        .bind(&checkpoint.modified)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx_write(e, &self.table))?;

        Ok(())
    }

    async fn provision(&self) -> Result<(), StoreError> {
        tracing::info!(table = %self.table, "Creating checkpoint table");
        self.create_table().await?;
        tracing::info!(table = %self.table, "Checkpoint table is ready");
        Ok(())
    }
}

impl Database {
    /// All delivered entries for a feed in the order they were recorded.
    ///
    /// The checkpoint row is excluded.
    pub async fn delivered_entries(
        &self,
        feed_url: &str,
    ) -> Result<Vec<DeliveredEntryRecord>, StoreError> {
        let records = sqlx::query_as::<_, DeliveredEntryRecord>(&format!(
            r#"
            SELECT rssurl AS feed_url, feedid AS entry_id, published,
                   COALESCE(title, '') AS title, COALESCE(link, '') AS link
            FROM {}
            WHERE rssurl = ? AND feedid != ?
            ORDER BY recorded_at, rowid
        "#,
            self.table
        ))
        .bind(feed_url)
        .bind(CHECKPOINT_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, &self.table))?;

        Ok(records)
    }
}
