use crate::feed::parser::{parse_feed, Entry};
use futures::StreamExt;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED, USER_AGENT};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Anything other than 200 or 304
    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The feed changed (or no hint was sent).
    Fresh {
        /// Entries in source order
        entries: Vec<Entry>,
        /// Modification marker to send back on the next fetch, if the source gave one
        modified: Option<String>,
    },
    /// Nothing changed since the hint.
    NotModified,
}

/// Somewhere feeds come from.
pub trait FeedSource {
    /// Fetch `url`, asking only for changes since `since` when given.
    fn fetch(
        &self,
        url: &str,
        since: Option<&str>,
    ) -> impl Future<Output = Result<FetchOutcome, FetchError>> + Send;
}

/// Fetches feeds over HTTP with `If-Modified-Since`.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpFeedSource {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: Self::DEFAULT_TIMEOUT,
            user_agent: format!("rssfeeder/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str, since: Option<&str>) -> Result<FetchOutcome, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str());
        if let Some(since) = since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                tracing::debug!(feed = %url, "Feed not modified");
                Ok(FetchOutcome::NotModified)
            }
            StatusCode::OK => {
                let modified = response
                    .headers()
                    .get(LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                let bytes = tokio::time::timeout(
                    self.timeout,
                    read_limited_bytes(response, MAX_FEED_SIZE),
                )
                .await
                .map_err(|_| FetchError::Timeout)??;

                let entries = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

                tracing::debug!(
                    feed = %url,
                    entries = entries.len(),
                    modified = ?modified,
                    "Fetched feed"
                );

                Ok(FetchOutcome::Fresh { entries, modified })
            }
            status => Err(FetchError::UnexpectedStatus(status.as_u16())),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
