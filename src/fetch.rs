//! Topic acquisition: the `fetch` command and the `POST /fetch` handler.
//!
//! A comma-separated topic list is fetched one topic at a time through the
//! shared [`FetchCache`]. A failure on one topic is recorded and the batch
//! moves on to the next.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use paperdesk_core::clock::SystemClock;
use paperdesk_core::store::Store;

use crate::arxiv::ArxivClient;
use crate::cache::FetchCache;
use crate::config::Config;
use crate::sqlite_store::SqliteStore;
use crate::topics::print_topic_table;

/// Documents requested per topic when no count is given.
pub const DEFAULT_COUNT: usize = 50;

/// Upper bound on documents requested per topic.
pub const MAX_COUNT: usize = 200;

/// Outcome for one topic of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct TopicFetch {
    pub topic: String,
    /// Documents the cache holds for the topic after the call.
    pub documents: usize,
    /// Documents obtained from the source during the call.
    pub fetched: usize,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicError {
    pub topic: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub results: Vec<TopicFetch>,
    pub errors: Vec<TopicError>,
}

/// Split a comma-separated topic list, dropping blank items.
pub fn split_topics(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Reject counts outside `1..=MAX_COUNT`.
pub fn check_count(count: usize) -> Result<usize> {
    if !(1..=MAX_COUNT).contains(&count) {
        anyhow::bail!("count must be between 1 and {}, got {}", MAX_COUNT, count);
    }
    Ok(count)
}

/// The freshness window for a request. Forcing a refresh means zero.
pub fn fetch_interval(config: &Config, force: bool) -> Duration {
    if force {
        Duration::ZERO
    } else {
        Duration::from_secs(config.cache.fetch_interval_secs)
    }
}

/// Build a fetch cache over the arXiv client and `store`.
pub fn arxiv_cache(config: &Config, store: Arc<dyn Store>) -> Result<FetchCache> {
    let source = ArxivClient::from_config(&config.source)?;
    Ok(FetchCache::new(
        Arc::new(source),
        store,
        Arc::new(SystemClock),
        config.source.batch_size,
    ))
}

/// Fetch every topic in order, collecting per-topic failures.
pub async fn fetch_topics(
    cache: &FetchCache,
    topics: &[String],
    count: usize,
    interval: Duration,
) -> BatchReport {
    let mut report = BatchReport::default();

    for topic in topics {
        match cache.fetch(topic, count, interval).await {
            Ok(outcome) => report.results.push(TopicFetch {
                topic: topic.clone(),
                documents: outcome.documents.len(),
                fetched: outcome.fetched,
                from_cache: outcome.from_cache,
            }),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "topic fetch failed");
                report.errors.push(TopicError {
                    topic: topic.clone(),
                    message: format!("{:#}", e),
                });
            }
        }
    }

    report
}

/// CLI entry point for `paperdesk fetch`.
pub async fn run_fetch(config: &Config, topics: &str, count: usize, force: bool) -> Result<()> {
    let count = check_count(count)?;
    let topics = split_topics(topics);
    if topics.is_empty() {
        anyhow::bail!("No topics given. Pass a comma-separated list, e.g. \"ai, robotics\".");
    }

    let store = SqliteStore::connect(config).await?;
    let cache = arxiv_cache(config, Arc::new(store.clone()))?;

    let report = fetch_topics(&cache, &topics, count, fetch_interval(config, force)).await;

    for result in &report.results {
        if result.from_cache {
            println!(
                "Using cached data for '{}' ({} documents)",
                result.topic, result.documents
            );
        } else {
            println!(
                "Fetched fresh data for '{}' ({} fetched, {} cached)",
                result.topic, result.fetched, result.documents
            );
        }
    }
    for error in &report.errors {
        eprintln!("Error fetching '{}': {}", error.topic, error.message);
    }

    println!();
    print_topic_table(&store.list_topics().await?);
    store.close().await;

    if !report.errors.is_empty() {
        anyhow::bail!(
            "{} of {} topic(s) failed",
            report.errors.len(),
            topics.len()
        );
    }
    Ok(())
}
