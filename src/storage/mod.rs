//! Durable delivery state: which entries were posted and the per-feed checkpoint.

mod dry_run;
mod entries;
mod schema;
mod store;
mod types;

pub use dry_run::DryRunStore;
pub use schema::{Database, DEFAULT_TABLE};
pub use store::CheckpointStore;
pub use types::{DeliveredEntryRecord, FeedCheckpoint, StoreError, CHECKPOINT_KEY};
