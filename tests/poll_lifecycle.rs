//! Integration tests for the poll lifecycle: bootstrap, conditional refetch,
//! dedup across polls, fail-fast delivery, and webhook delivery.
//!
//! Feeds are served by wiremock; state lives in SQLite (in-memory unless the
//! test needs to reopen the file).

use pretty_assertions::assert_eq;
use rssfeeder::feed::Entry;
use rssfeeder::poster::{PostError, Poster};
use rssfeeder::storage::{CheckpointStore, Database, DryRunStore, StoreError, DEFAULT_TABLE};
use rssfeeder::{Feeder, FeederError, HttpFeedSource, PollOutcome, WebhookPoster};
use secrecy::SecretString;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const LAST_MOD_1: &str = "Mon, 01 Jan 2024 00:00:00 GMT";
const LAST_MOD_2: &str = "Tue, 02 Jan 2024 00:00:00 GMT";

/// Matches the raw `If-Modified-Since` value. wiremock's `header` matcher
/// splits on commas, and every HTTP date has one.
struct IfModifiedSince(&'static str);

impl Match for IfModifiedSince {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get("if-modified-since")
            .and_then(|v| v.to_str().ok())
            == Some(self.0)
    }
}

fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(guid, date)| {
            format!(
                "<item><guid>{guid}</guid><title>Post {guid}</title>\
                 <link>https://example.com/{guid}</link><pubDate>{date}</pubDate></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title>{body}</channel></rss>"#)
}

#[derive(Default)]
struct RecordingPoster {
    posted: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingPoster {
    fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }
}

impl Poster for RecordingPoster {
    async fn post(&self, entry: &Entry) -> Result<(), PostError> {
        if self.fail_on.as_deref() == Some(entry.id.as_str()) {
            return Err(PostError::Rejected(503));
        }
        self.posted.lock().unwrap().push(entry.id.clone());
        Ok(())
    }
}

async fn test_db() -> Database {
    Database::open(":memory:", DEFAULT_TABLE).await.unwrap()
}

fn source() -> HttpFeedSource {
    HttpFeedSource::new(reqwest::Client::new())
}

async fn recorded_ids(db: &Database, feed: &str) -> Vec<String> {
    db.delivered_entries(feed)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.entry_id)
        .collect()
}

// ============================================================================
// Bootstrap and Conditional Fetch
// ============================================================================

#[tokio::test]
async fn test_bootstrap_then_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(IfModifiedSince(LAST_MOD_1))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[
                    ("c", "Wed, 03 Jan 2024 00:00:00 GMT"),
                    ("a", "Mon, 01 Jan 2024 00:00:00 GMT"),
                    ("b", "Tue, 02 Jan 2024 00:00:00 GMT"),
                ]))
                .insert_header("Last-Modified", LAST_MOD_1),
        )
        .expect(1)
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed", server.uri());
    let db = test_db().await;
    let poster = RecordingPoster::default();

    let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), &poster)
        .await
        .unwrap();

    let first = feeder.poll().await.unwrap();
    assert_eq!(
        first,
        PollOutcome::Fresh {
            delivered: 3,
            skipped: 0,
            checkpoint: Some(LAST_MOD_1.to_string()),
        }
    );
    assert_eq!(poster.posted(), vec!["a", "b", "c"]);

    let second = feeder.poll().await.unwrap();
    assert_eq!(second, PollOutcome::NotModified);
    assert_eq!(poster.posted().len(), 3);
    assert_eq!(recorded_ids(&db, &feed_url).await, vec!["a", "b", "c"]);

    let checkpoint = db.get_checkpoint(&feed_url).await.unwrap().unwrap();
    assert_eq!(checkpoint.modified, LAST_MOD_1);
}

#[tokio::test]
async fn test_state_survives_reopening_database() {
    let dir = std::env::temp_dir().join("rssfeeder_poll_lifecycle_reopen");
    std::fs::create_dir_all(&dir).unwrap();
    let db_file = dir.join("state.db");
    std::fs::remove_file(&db_file).ok();
    let db_path = db_file.to_str().unwrap().to_string();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(IfModifiedSince(LAST_MOD_1))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[
                    ("a", "Mon, 01 Jan 2024 00:00:00 GMT"),
                    ("d", "Thu, 04 Jan 2024 00:00:00 GMT"),
                ]))
                .insert_header("Last-Modified", LAST_MOD_2),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[("a", "Mon, 01 Jan 2024 00:00:00 GMT")]))
                .insert_header("Last-Modified", LAST_MOD_1),
        )
        .expect(1)
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed", server.uri());

    {
        let db = Database::open(&db_path, DEFAULT_TABLE).await.unwrap();
        let poster = RecordingPoster::default();
        let mut feeder = Feeder::new(feed_url.as_str(), db, source(), &poster)
            .await
            .unwrap();
        feeder.poll().await.unwrap();
        assert_eq!(poster.posted(), vec!["a"]);
    }

    let db = Database::open(&db_path, DEFAULT_TABLE).await.unwrap();
    let poster = RecordingPoster::default();
    let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), &poster)
        .await
        .unwrap();
    assert_eq!(feeder.checkpoint(), Some(LAST_MOD_1));

    let outcome = feeder.poll().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Fresh {
            delivered: 1,
            skipped: 1,
            checkpoint: Some(LAST_MOD_2.to_string()),
        }
    );
    assert_eq!(poster.posted(), vec!["d"]);
    assert_eq!(recorded_ids(&db, &feed_url).await, vec!["a", "d"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_feeds_share_a_table_independently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[("shared-id", "Mon, 01 Jan 2024 00:00:00 GMT")]))
                .insert_header("Last-Modified", LAST_MOD_1),
        )
        .mount(&server)
        .await;

    let db = test_db().await;
    let poster = RecordingPoster::default();

    for name in ["one", "two"] {
        let feed_url = format!("{}/{}", server.uri(), name);
        let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), &poster)
            .await
            .unwrap();
        feeder.poll().await.unwrap();
    }

    // Same entry id under two feeds is delivered once per feed
    assert_eq!(poster.posted(), vec!["shared-id", "shared-id"]);
}

#[tokio::test]
async fn test_dry_run_leaves_entries_for_the_real_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[
                    ("b", "Tue, 02 Jan 2024 00:00:00 GMT"),
                    ("a", "Mon, 01 Jan 2024 00:00:00 GMT"),
                ]))
                .insert_header("Last-Modified", LAST_MOD_1),
        )
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed", server.uri());
    let db = test_db().await;

    let preview = RecordingPoster::default();
    let mut feeder = Feeder::new(
        feed_url.as_str(),
        DryRunStore::new(db.clone()),
        source(),
        &preview,
    )
    .await
    .unwrap();
    feeder.poll().await.unwrap();
    assert_eq!(preview.posted(), vec!["a", "b"]);

    // Nothing was provisioned or written
    assert!(matches!(
        db.get_checkpoint(&feed_url).await,
        Err(StoreError::CollectionMissing { .. })
    ));

    let real = RecordingPoster::default();
    let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), &real)
        .await
        .unwrap();
    assert_eq!(feeder.checkpoint(), None);
    feeder.poll().await.unwrap();

    assert_eq!(real.posted(), vec!["a", "b"]);
    assert_eq!(recorded_ids(&db, &feed_url).await, vec!["a", "b"]);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_delivery_failure_keeps_checkpoint_and_resumes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[
                    ("e3", "Wed, 03 Jan 2024 00:00:00 GMT"),
                    ("e1", "Mon, 01 Jan 2024 00:00:00 GMT"),
                    ("e2", "Tue, 02 Jan 2024 00:00:00 GMT"),
                ]))
                .insert_header("Last-Modified", LAST_MOD_1),
        )
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed", server.uri());
    let db = test_db().await;

    let failing = RecordingPoster {
        fail_on: Some("e2".to_string()),
        ..Default::default()
    };
    let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), &failing)
        .await
        .unwrap();

    match feeder.poll().await {
        Err(FeederError::Delivery { entry_id, source }) => {
            assert_eq!(entry_id, "e2");
            assert!(matches!(source, PostError::Rejected(503)));
        }
        other => panic!("Expected Delivery error, got {:?}", other),
    }
    assert_eq!(failing.posted(), vec!["e1"]);
    assert_eq!(recorded_ids(&db, &feed_url).await, vec!["e1"]);
    assert!(db.get_checkpoint(&feed_url).await.unwrap().is_none());

    // The next run starts over unconditionally and only sends the rest
    let healthy = RecordingPoster::default();
    let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), &healthy)
        .await
        .unwrap();
    feeder.poll().await.unwrap();
    assert_eq!(healthy.posted(), vec!["e2", "e3"]);
}

#[tokio::test]
async fn test_server_error_fails_poll() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed", server.uri());
    let poster = RecordingPoster::default();
    let mut feeder = Feeder::new(feed_url.as_str(), test_db().await, source(), &poster)
        .await
        .unwrap();

    let err = feeder.poll().await.unwrap_err();
    assert!(matches!(err, FeederError::Fetch(_)));
    assert!(err.to_string().contains("502"));
}

// ============================================================================
// Webhook Delivery
// ============================================================================

#[tokio::test]
async fn test_entries_posted_to_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[
                    ("a", "Mon, 01 Jan 2024 00:00:00 GMT"),
                    ("b", "Tue, 02 Jan 2024 00:00:00 GMT"),
                ]))
                .insert_header("Last-Modified", LAST_MOD_1),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed", server.uri());
    let poster = WebhookPoster::new(
        reqwest::Client::new(),
        SecretString::from(format!("{}/hook", server.uri())),
    );
    let db = test_db().await;

    let mut feeder = Feeder::new(feed_url.as_str(), db.clone(), source(), poster)
        .await
        .unwrap();
    feeder.poll().await.unwrap();

    assert_eq!(feeder.feed_url(), feed_url);
    assert_eq!(
        recorded_ids(feeder.store(), feeder.feed_url()).await,
        vec!["a", "b"]
    );
}
