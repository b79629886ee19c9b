use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::store::CheckpointStore;
use super::types::{DeliveredEntryRecord, FeedCheckpoint, StoreError};

/// Read-through wrapper that never writes to the wrapped store.
///
/// Lookups see the real delivery history, so a dry run reports exactly what
/// a real run would post. Deliveries made during the run are remembered in
/// memory only; checkpoints and provisioning are dropped. A store without its
/// collection reads as empty instead of being provisioned.
///
/// Clones share the in-memory record.
#[derive(Debug, Clone)]
pub struct DryRunStore<S> {
    inner: S,
    delivered: Arc<Mutex<HashSet<(String, String)>>>,
}

impl<S> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            delivered: Arc::default(),
        }
    }

    fn seen(&self, feed_url: &str, entry_id: &str) -> bool {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(feed_url.to_string(), entry_id.to_string()))
    }
}

impl<S: CheckpointStore + Sync> CheckpointStore for DryRunStore<S> {
    async fn get_checkpoint(&self, feed_url: &str) -> Result<Option<FeedCheckpoint>, StoreError> {
        match self.inner.get_checkpoint(feed_url).await {
            Err(StoreError::CollectionMissing { .. }) => Ok(None),
            other => other,
        }
    }

    async fn is_delivered(&self, feed_url: &str, entry_id: &str) -> Result<bool, StoreError> {
        if self.seen(feed_url, entry_id) {
            return Ok(true);
        }
        match self.inner.is_delivered(feed_url, entry_id).await {
            Err(StoreError::CollectionMissing { .. }) => Ok(false),
            other => other,
        }
    }

    async fn record_delivery(&self, record: &DeliveredEntryRecord) -> Result<(), StoreError> {
        tracing::debug!(
            feed = %record.feed_url,
            entry_id = %record.entry_id,
            "Dry run, delivery not recorded"
        );
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((record.feed_url.clone(), record.entry_id.clone()));
        Ok(())
    }

    async fn put_checkpoint(&self, checkpoint: &FeedCheckpoint) -> Result<(), StoreError> {
        tracing::debug!(
            feed = %checkpoint.feed_url,
            modified = %checkpoint.modified,
            "Dry run, checkpoint not recorded"
        );
        Ok(())
    }

    async fn provision(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
