//! Feed retrieval and parsing.
//!
//! - [`parser`] - Low-level feed parsing using the `feed-rs` crate
//! - [`fetcher`] - The [`FeedSource`] seam and its HTTP implementation with
//!   conditional retrieval (`If-Modified-Since` / `Last-Modified`)
//!
//! # Example
//!
//! ```ignore
//! use rssfeeder::feed::{FeedSource, FetchOutcome, HttpFeedSource};
//!
//! let source = HttpFeedSource::new(reqwest::Client::new());
//! match source.fetch("https://example.com/feed.xml", None).await? {
//!     FetchOutcome::Fresh { entries, modified } => { /* ... */ }
//!     FetchOutcome::NotModified => {}
//! }
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedSource, FetchError, FetchOutcome, HttpFeedSource};
pub use parser::{parse_feed, Entry};
