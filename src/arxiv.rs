//! arXiv Atom feed client.
//!
//! Implements [`PaperSource`] against the arXiv export API:
//!
//! ```text
//! GET <base_url>?search_query=all:<topic>&start=<offset>&max_results=<n>
//! ```
//!
//! The client fails fast: a non-200 status becomes
//! [`SourceError::Status`] and nothing is retried.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use paperdesk_core::source::{PaperSource, RawEntry, SourceError};

use crate::config::SourceConfig;

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: String,
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: String,
}

/// Client for the arXiv query API.
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("paperdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        Self::new(config.base_url.clone())
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn fetch_page(
        &self,
        topic: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<RawEntry>, SourceError> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("search_query", format!("all:{}", topic)),
                ("start", start.to_string()),
                ("max_results", max_results.to_string()),
            ],
        )
        .map_err(|e| SourceError::Transport(e.to_string()))?;

        tracing::debug!(%url, "querying arXiv");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        parse_feed(&body)
    }

    fn name(&self) -> &str {
        "arxiv"
    }
}

/// Parse an Atom feed body into raw entries.
///
/// Runs of whitespace (arXiv wraps long titles and abstracts) collapse to a
/// single space.
pub fn parse_feed(body: &str) -> Result<Vec<RawEntry>, SourceError> {
    let feed: AtomFeed =
        quick_xml::de::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| RawEntry {
            id: entry.id.trim().to_string(),
            title: collapse_ws(&entry.title),
            summary: collapse_ws(&entry.summary),
            authors: entry
                .authors
                .into_iter()
                .map(|a| collapse_ws(&a.name))
                .filter(|name| !name.is_empty())
                .collect(),
        })
        .collect())
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
