//! Storage abstraction for Paperdesk.
//!
//! The [`Store`] trait covers every persistence operation the fetch cache
//! and the ask pipeline need, so they run unchanged against SQLite in
//! production and [`memory::InMemoryStore`] in tests.
//!
//! Topic names passed to a store are normalized by the store itself; callers
//! may pass raw user input.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AddOutcome, Document, PaperRecord, Topic};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add_document`](Store::add_document) | Idempotent insert, de-duplicated by title |
/// | [`get_topic`](Store::get_topic) | Exact lookup by normalized name |
/// | [`find_topic`](Store::find_topic) | Exact, then substring lookup |
/// | [`list_topics`](Store::list_topics) | All topics with counts |
/// | [`documents_by_topic`](Store::documents_by_topic) | Documents owned by a topic |
/// | [`cached_embedding`](Store::cached_embedding) | Stored vector for a document, if current |
/// | [`put_embedding`](Store::put_embedding) | Store a document vector |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert `record` under `topic`, creating the topic if needed.
    ///
    /// If a document with the same title exists anywhere in the store it is
    /// returned unchanged and no count is touched. The topic row is created
    /// either way.
    async fn add_document(&self, topic: &str, record: &PaperRecord) -> Result<AddOutcome>;

    /// Look up a topic by normalized name.
    async fn get_topic(&self, name: &str) -> Result<Option<Topic>>;

    /// Look up a topic by exact normalized name, falling back to the first
    /// topic (lowest id) whose name contains the normalized query.
    async fn find_topic(&self, query: &str) -> Result<Option<Topic>>;

    /// All topics, ordered by name.
    async fn list_topics(&self) -> Result<Vec<Topic>>;

    /// Documents owned by the topic, in insertion order. Unknown topic → empty.
    async fn documents_by_topic(&self, name: &str) -> Result<Vec<Document>>;

    /// A stored vector for `document_id` embedded with `model` from text
    /// hashing to `content_hash`.
    async fn cached_embedding(
        &self,
        document_id: i64,
        model: &str,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>>;

    /// Store or replace the vector for `document_id`.
    async fn put_embedding(
        &self,
        document_id: i64,
        model: &str,
        content_hash: &str,
        vector: &[f32],
    ) -> Result<()>;

    /// Insert many records under one topic; returns how many were new.
    async fn add_documents(&self, topic: &str, records: &[PaperRecord]) -> Result<usize> {
        let mut inserted = 0;
        for record in records {
            if self.add_document(topic, record).await?.is_inserted() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
