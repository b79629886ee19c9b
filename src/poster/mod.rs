//! Delivery destinations for new feed entries.

mod webhook;

use crate::feed::Entry;
use std::future::Future;
use std::io::Write;
use thiserror::Error;

pub use webhook::WebhookPoster;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Destination rejected the post: status {0}")]
    Rejected(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Delivers a single entry somewhere.
///
/// `Ok(())` means the entry was delivered and may be recorded as such.
pub trait Poster {
    fn post(&self, entry: &Entry) -> impl Future<Output = Result<(), PostError>> + Send;
}

impl<P: Poster + Sync> Poster for &P {
    fn post(&self, entry: &Entry) -> impl Future<Output = Result<(), PostError>> + Send {
        (**self).post(entry)
    }
}

/// Prints entries to stdout. Used for `--dry-run`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPoster;

impl Poster for StdoutPoster {
    async fn post(&self, entry: &Entry) -> Result<(), PostError> {
        let published = entry
            .published
            .map(|p| p.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "[{}] {}\n    {}", published, entry.title, entry.link)
            .map_err(|e| PostError::Failed(e.to_string()))
    }
}
