use super::{PostError, Poster};
use crate::feed::Entry;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Incoming-webhook message body. `Content` is the field Amazon Chime reads;
/// Slack-compatible endpoints accept the same shape via `text`.
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    #[serde(rename = "Content")]
    content: &'a str,
    text: &'a str,
}

/// Posts each entry as a chat message to an incoming webhook.
///
/// The webhook URL embeds its credential, so it is held as a secret and
/// never printed.
pub struct WebhookPoster {
    client: reqwest::Client,
    url: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for WebhookPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookPoster")
            .field("url", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WebhookPoster {
    pub fn new(client: reqwest::Client, url: SecretString) -> Self {
        Self {
            client,
            url,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn render(entry: &Entry) -> String {
        if entry.link.is_empty() {
            entry.title.clone()
        } else {
            format!("{}\n{}", entry.title, entry.link)
        }
    }
}

impl Poster for WebhookPoster {
    async fn post(&self, entry: &Entry) -> Result<(), PostError> {
        let content = Self::render(entry);
        let body = serde_json::to_vec(&WebhookMessage {
            content: &content,
            text: &content,
        })
        .map_err(|e| PostError::Failed(e.to_string()))?;

        let request = self
            .client
            .post(self.url.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| PostError::Timeout)?
            .map_err(PostError::Network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(entry_id = %entry.id, status = %status, "Webhook rejected entry");
            return Err(PostError::Rejected(status.as_u16()));
        }

        tracing::debug!(entry_id = %entry.id, "Posted entry to webhook");
        Ok(())
    }
}
