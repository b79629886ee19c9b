use anyhow::{Context, Result};
use clap::Parser;
use rssfeeder::storage::StoreError;
use rssfeeder::{
    CheckpointStore, Config, Database, DryRunStore, Feeder, HttpFeedSource, PollOutcome, Poster,
    StdoutPoster, WebhookPoster,
};
use secrecy::SecretString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rssfeeder",
    about = "Post new RSS/Atom entries to a webhook, once each"
)]
struct Args {
    /// Config file
    #[arg(long, short, value_name = "FILE", default_value = "rssfeeder.toml")]
    config: PathBuf,

    /// Feed to poll (repeatable). Replaces the configured feed list.
    #[arg(long = "feed", value_name = "URL")]
    feeds: Vec<String>,

    /// Print new entries instead of posting them. Nothing is written to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    if !args.feeds.is_empty() {
        config
            .set_feeds(args.feeds.clone())
            .context("Invalid --feed argument")?;
    }
    if let Ok(url) = std::env::var("RSSFEEDER_WEBHOOK_URL") {
        config.webhook_url = Some(url);
    }

    if config.feeds.is_empty() {
        eprintln!("Error: no feeds to poll.");
        eprintln!();
        eprintln!("List them in {}:", args.config.display());
        eprintln!("  feeds = [\"https://example.com/feed.xml\"]");
        eprintln!("or pass --feed URL.");
        std::process::exit(2);
    }

    let db_path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path, &config.table).await {
        Ok(db) => db,
        Err(StoreError::Locked) => {
            eprintln!("Error: the checkpoint database is locked by another process.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let client = reqwest::Client::new();
    let mut source = HttpFeedSource::new(client.clone()).with_timeout(config.request_timeout());
    if let Some(agent) = &config.user_agent {
        source = source.with_user_agent(agent.clone());
    }

    let failures = if args.dry_run {
        let store = DryRunStore::new(db);
        poll_all(&config, &store, &source, &StdoutPoster).await
    } else {
        let url = config.webhook_url.clone().map(SecretString::from).ok_or_else(|| {
            anyhow::anyhow!(
                "No webhook configured: set webhook_url or RSSFEEDER_WEBHOOK_URL, or use --dry-run"
            )
        })?;
        let poster = WebhookPoster::new(client, url).with_timeout(config.request_timeout());
        poll_all(&config, &db, &source, &poster).await
    };

    if failures > 0 {
        anyhow::bail!("{} of {} feeds failed", failures, config.feeds.len());
    }
    Ok(())
}

/// Poll every configured feed once, in order. Returns the number that failed.
async fn poll_all<S, P>(
    config: &Config,
    store: &S,
    source: &HttpFeedSource,
    poster: &P,
) -> usize
where
    S: CheckpointStore + Clone,
    P: Poster + Sync,
{
    let mut failures = 0;

    for url in &config.feeds {
        let result = async {
            let mut feeder = Feeder::new(url.as_str(), store.clone(), source.clone(), poster).await?;
            feeder.poll().await
        }
        .await;

        match result {
            Ok(PollOutcome::NotModified) => {
                println!("{}: not modified", url);
            }
            Ok(PollOutcome::Fresh {
                delivered, skipped, ..
            }) => {
                println!("{}: {} new, {} seen before", url, delivered, skipped);
            }
            Err(e) => {
                tracing::error!(feed = %url, error = %e, "Poll failed");
                eprintln!("{}: {}", url, e);
                failures += 1;
            }
        }
    }

    failures
}
