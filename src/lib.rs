//! Poll RSS/Atom feeds and forward entries that have not been delivered yet.
//!
//! A [`Feeder`] fetches one feed (conditionally, once it has a checkpoint),
//! posts unseen entries oldest first through a [`Poster`], and records each
//! delivery plus the feed's last-modified marker in a [`CheckpointStore`].

pub mod config;
pub mod feed;
pub mod feeder;
pub mod poster;
pub mod storage;
pub mod util;

pub use config::{Config, ConfigError};
pub use feed::{Entry, FeedSource, FetchError, FetchOutcome, HttpFeedSource};
pub use feeder::{Feeder, FeederError, PollOutcome};
pub use poster::{PostError, Poster, StdoutPoster, WebhookPoster};
pub use storage::{
    CheckpointStore, Database, DeliveredEntryRecord, DryRunStore, FeedCheckpoint, StoreError,
};
