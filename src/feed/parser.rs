use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One item from a feed, as handed to a [`Poster`](crate::poster::Poster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    /// Publication time, falling back to the entry's update time
    pub published: Option<DateTime<Utc>>,
    pub title: String,
    pub link: String,
}

pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Entry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published = entry.published.or(entry.updated);
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let id = generate_id(existing_id, &link, &title, published);

            Entry {
                id,
                published,
                title,
                link,
            }
        })
        .collect();

    Ok(entries)
}

fn generate_id(
    existing: Option<&str>,
    link: &str,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(id) = existing {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        link,
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
