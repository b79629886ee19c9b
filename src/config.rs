//! Configuration file parser for `rssfeeder.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use crate::storage::DEFAULT_TABLE;
use crate::util::{validate_feed_url, UrlValidationError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed URL '{url}': {source}")]
    InvalidFeedUrl {
        url: String,
        #[source]
        source: UrlValidationError,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The Debug impl masks `webhook_url`, which carries its own credential.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding delivery records and checkpoints.
    pub database_path: PathBuf,

    /// Table inside the database. Several deployments can share one file.
    pub table: String,

    /// Per-request timeout for feed fetches and webhook posts, in seconds.
    pub request_timeout_secs: u64,

    /// User-Agent sent with feed requests.
    pub user_agent: Option<String>,

    /// Incoming webhook that receives new entries.
    /// The RSSFEEDER_WEBHOOK_URL env var takes precedence.
    pub webhook_url: Option<String>,

    /// Feed URLs to poll, in order.
    pub feeds: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("rssfeeder.db"),
            table: DEFAULT_TABLE.to_string(),
            request_timeout_secs: 30,
            user_agent: None,
            webhook_url: None,
            feeds: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("table", &self.table)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("feeds", &self.feeds)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "database_path",
        "table",
        "request_timeout_secs",
        "user_agent",
        "webhook_url",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Feed URL that is not http(s) → `Err(ConfigError::InvalidFeedUrl)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate_feeds()?;

        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            table = %config.table,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Replace the feed list, validating each URL.
    pub fn set_feeds(&mut self, feeds: Vec<String>) -> Result<(), ConfigError> {
        self.feeds = feeds;
        self.validate_feeds()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate_feeds(&self) -> Result<(), ConfigError> {
        for url in &self.feeds {
            validate_feed_url(url).map_err(|source| ConfigError::InvalidFeedUrl {
                url: url.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
