use std::future::Future;

use super::types::{DeliveredEntryRecord, FeedCheckpoint, StoreError};

/// Durable two-key record store backing the feeder.
///
/// Rows are keyed by `(feed_url, entry_id)`. The checkpoint lives in the same
/// collection under [`CHECKPOINT_KEY`](super::CHECKPOINT_KEY).
///
/// Every operation is a single round trip; implementations must not retry on
/// their own. A missing backing collection is reported as
/// [`StoreError::CollectionMissing`] so the caller can decide to
/// [`provision`](CheckpointStore::provision).
pub trait CheckpointStore {
    /// Read the checkpoint for a feed, `None` if the feed was never polled.
    fn get_checkpoint(
        &self,
        feed_url: &str,
    ) -> impl Future<Output = Result<Option<FeedCheckpoint>, StoreError>> + Send;

    /// Membership test: has `entry_id` already been delivered for `feed_url`?
    fn is_delivered(
        &self,
        feed_url: &str,
        entry_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Record a successful delivery in one write.
    fn record_delivery(
        &self,
        record: &DeliveredEntryRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Create or overwrite the feed checkpoint.
    fn put_checkpoint(
        &self,
        checkpoint: &FeedCheckpoint,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Create the backing collection. Succeeds if it already exists.
    fn provision(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
