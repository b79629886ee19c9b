//! Poll one feed and deliver what is new.
//!
//! A [`Feeder`] ties a feed URL to a [`CheckpointStore`], a [`FeedSource`] and
//! a [`Poster`]. Each [`poll`](Feeder::poll):
//!
//! 1. fetches the feed, conditionally once a checkpoint exists,
//! 2. sorts fresh entries by publication time (stable, oldest first),
//! 3. posts every entry not yet recorded and records it right after,
//! 4. advances the checkpoint once the whole batch went through.
//!
//! A failed post stops the poll where it is. Entries posted before the
//! failure stay recorded, the checkpoint does not move, and the next poll
//! picks up from the failed entry.

use crate::feed::{Entry, FeedSource, FetchError, FetchOutcome};
use crate::poster::{PostError, Poster};
use crate::storage::{CheckpointStore, DeliveredEntryRecord, FeedCheckpoint, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeederError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Could not post entry {entry_id}: {source}")]
    Delivery {
        entry_id: String,
        #[source]
        source: PostError,
    },
}

/// What a successful poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The source reported no change since the checkpoint.
    NotModified,
    /// The source returned a batch and every entry in it was posted or
    /// already on record.
    Fresh {
        /// Entries posted during this poll
        delivered: usize,
        /// Entries already recorded as delivered
        skipped: usize,
        /// Checkpoint in effect after the poll
        checkpoint: Option<String>,
    },
}

pub struct Feeder<S, F, P> {
    feed_url: String,
    store: S,
    source: F,
    poster: P,
    checkpoint: Option<String>,
}

impl<S, F, P> std::fmt::Debug for Feeder<S, F, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feeder")
            .field("feed_url", &self.feed_url)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

impl<S, F, P> Feeder<S, F, P>
where
    S: CheckpointStore,
    F: FeedSource,
    P: Poster,
{
    /// Create a feeder and load the feed's checkpoint.
    ///
    /// If the store has no backing collection yet it is provisioned and the
    /// checkpoint read once more.
    ///
    /// # Errors
    ///
    /// Any store error other than a missing collection, a failed provision,
    /// or any error from the second read.
    pub async fn new(
        feed_url: impl Into<String>,
        store: S,
        source: F,
        poster: P,
    ) -> Result<Self, FeederError> {
        let feed_url = feed_url.into();
        tracing::info!(feed = %feed_url, "Checking feed");

        let checkpoint = load_checkpoint(&store, &feed_url).await?;

        Ok(Self {
            feed_url,
            store,
            source,
            poster,
            checkpoint,
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Last-modified marker that the next poll will send, if any.
    pub fn checkpoint(&self) -> Option<&str> {
        self.checkpoint.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the feed and deliver entries not seen before.
    ///
    /// # Errors
    ///
    /// - [`FeederError::Fetch`] if the fetch fails or returns an unexpected status
    /// - [`FeederError::Delivery`] if the poster fails; the poll stops at that entry
    /// - [`FeederError::Store`] if a lookup or write fails
    pub async fn poll(&mut self) -> Result<PollOutcome, FeederError> {
        if let Some(since) = &self.checkpoint {
            tracing::debug!(feed = %self.feed_url, modified = %since, "Conditional fetch");
        }

        let outcome = self
            .source
            .fetch(&self.feed_url, self.checkpoint.as_deref())
            .await?;

        let (mut entries, modified) = match outcome {
            FetchOutcome::NotModified => {
                tracing::info!(feed = %self.feed_url, "No new entries");
                return Ok(PollOutcome::NotModified);
            }
            FetchOutcome::Fresh { entries, modified } => (entries, modified),
        };

        tracing::info!(feed = %self.feed_url, entries = entries.len(), "Fetched feed entries");

        // Stable: equal timestamps keep source order
        entries.sort_by(|a, b| a.published.cmp(&b.published));

        let mut delivered = 0;
        let mut skipped = 0;
        for entry in &entries {
            if self.store.is_delivered(&self.feed_url, &entry.id).await? {
                tracing::debug!(feed = %self.feed_url, entry_id = %entry.id, "Entry seen before");
                skipped += 1;
                continue;
            }
            self.deliver(entry).await?;
            delivered += 1;
        }

        match modified {
            Some(modified) => {
                tracing::debug!(feed = %self.feed_url, modified = %modified, "Recording checkpoint");
                self.store
                    .put_checkpoint(&FeedCheckpoint {
                        feed_url: self.feed_url.clone(),
                        modified: modified.clone(),
                    })
                    .await?;
                self.checkpoint = Some(modified);
            }
            None => {
                tracing::warn!(
                    feed = %self.feed_url,
                    "Source reported no modification time, checkpoint unchanged"
                );
            }
        }

        tracing::info!(
            feed = %self.feed_url,
            delivered = delivered,
            skipped = skipped,
            "Poll complete"
        );

        Ok(PollOutcome::Fresh {
            delivered,
            skipped,
            checkpoint: self.checkpoint.clone(),
        })
    }

    /// Post one entry, then record it.
    async fn deliver(&self, entry: &Entry) -> Result<(), FeederError> {
        self.poster
            .post(entry)
            .await
            .map_err(|source| FeederError::Delivery {
                entry_id: entry.id.clone(),
                source,
            })?;

        tracing::info!(feed = %self.feed_url, entry_id = %entry.id, "Recording delivered entry");
        self.store
            .record_delivery(&DeliveredEntryRecord {
                feed_url: self.feed_url.clone(),
                entry_id: entry.id.clone(),
                published: entry.published.map(|p| p.to_rfc3339()).unwrap_or_default(),
                title: entry.title.clone(),
                link: entry.link.clone(),
            })
            .await?;

        Ok(())
    }
}

/// Read the checkpoint, creating the store's collection first if it is missing.
///
/// Exactly one provision and one re-read; a second failure is returned as is.
async fn load_checkpoint<S: CheckpointStore>(
    store: &S,
    feed_url: &str,
) -> Result<Option<String>, StoreError> {
    let checkpoint = match store.get_checkpoint(feed_url).await {
        Ok(checkpoint) => checkpoint,
        Err(StoreError::CollectionMissing { table }) => {
            tracing::warn!(table = %table, "Checkpoint table is not available, creating");
            store.provision().await?;
            store.get_checkpoint(feed_url).await?
        }
        Err(e) => return Err(e),
    };

    Ok(checkpoint.map(|c| c.modified))
}
