//! Paper source abstraction.
//!
//! A [`PaperSource`] answers one page of a topic search. [`fetch_range`]
//! walks pages in fixed-size batches and [`process_entries`] turns raw feed
//! entries into [`PaperRecord`]s.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PaperRecord;

/// Errors produced by a paper source. Sources do not retry.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The remote API answered with a non-200 status.
    #[error("Error querying arXiv API: {0}")]
    Status(u16),

    /// The request never produced a response.
    #[error("Request to paper source failed: {0}")]
    Transport(String),

    /// The response body could not be parsed as a feed.
    #[error("Failed to parse paper feed: {0}")]
    Parse(String),
}

/// One entry of a source feed, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Entry identifier, e.g. `http://arxiv.org/abs/2401.00001v1`.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
}

/// A remote listing of papers that can be queried page by page.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Fetch up to `max_results` entries for `topic`, starting at `start`.
    async fn fetch_page(
        &self,
        topic: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<RawEntry>, SourceError>;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;
}

/// Fetch `total` entries starting at offset `start`, `batch_size` at a time.
///
/// Pages are concatenated in order without deduplication. The last page is
/// clamped to the remaining count, and paging stops early once the source
/// returns an empty page.
pub async fn fetch_range(
    source: &dyn PaperSource,
    topic: &str,
    start: usize,
    total: usize,
    batch_size: usize,
) -> Result<Vec<RawEntry>, SourceError> {
    let batch_size = batch_size.max(1);
    let end = start.saturating_add(total);
    let mut entries = Vec::new();
    let mut offset = start;

    while offset < end {
        let page_size = batch_size.min(end - offset);
        let page = source.fetch_page(topic, offset, page_size).await?;
        if page.is_empty() {
            break;
        }
        entries.extend(page);
        offset += page_size;
    }

    Ok(entries)
}

/// Derive the PDF link from an abstract-page identifier.
///
/// `http://arxiv.org/abs/2401.00001v1` → `http://arxiv.org/pdf/2401.00001v1.pdf`
pub fn pdf_link_from_id(id: &str) -> String {
    format!("{}.pdf", id.replace("abs", "pdf"))
}

impl PaperRecord {
    /// Normalize one feed entry: text is `title + ". " + summary` and the
    /// PDF link is derived from the entry id.
    pub fn from_entry(entry: RawEntry) -> Self {
        PaperRecord {
            text: format!("{}. {}", entry.title, entry.summary),
            pdf_link: pdf_link_from_id(&entry.id),
            title: entry.title,
            authors: entry.authors,
        }
    }
}

/// Normalize raw entries into paper records, preserving order.
pub fn process_entries(entries: Vec<RawEntry>) -> Vec<PaperRecord> {
    entries.into_iter().map(PaperRecord::from_entry).collect()
}
