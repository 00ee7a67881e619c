//! In-memory [`Store`] implementation for tests.
//!
//! All state sits behind one `std::sync::Mutex`, so `add_document` is
//! atomic with respect to concurrent callers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{normalize_topic, AddOutcome, Document, PaperRecord, Topic};

use super::Store;

struct StoredVector {
    model: String,
    content_hash: String,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    topics: Vec<Topic>,
    documents: Vec<Document>,
    vectors: HashMap<i64, StoredVector>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored documents across all topics.
    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn topic_index(&mut self, name: &str) -> usize {
        if let Some(pos) = self.topics.iter().position(|t| t.name == name) {
            return pos;
        }
        let id = self.topics.len() as i64 + 1;
        self.topics.push(Topic {
            id,
            name: name.to_string(),
            document_count: 0,
        });
        self.topics.len() - 1
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add_document(&self, topic: &str, record: &PaperRecord) -> Result<AddOutcome> {
        let name = normalize_topic(topic);
        let mut inner = self.lock();
        let topic_pos = inner.topic_index(&name);

        if let Some(existing) = inner.documents.iter().find(|d| d.title == record.title) {
            return Ok(AddOutcome::Existing(existing.clone()));
        }

        let doc = Document {
            id: inner.documents.len() as i64 + 1,
            topic_id: inner.topics[topic_pos].id,
            title: record.title.clone(),
            text: record.text.clone(),
            pdf_link: record.pdf_link.clone(),
            authors: record.authors_joined(),
        };
        inner.documents.push(doc.clone());
        inner.topics[topic_pos].document_count += 1;
        Ok(AddOutcome::Inserted(doc))
    }

    async fn get_topic(&self, name: &str) -> Result<Option<Topic>> {
        let name = normalize_topic(name);
        Ok(self.lock().topics.iter().find(|t| t.name == name).cloned())
    }

    async fn find_topic(&self, query: &str) -> Result<Option<Topic>> {
        let query = normalize_topic(query);
        if query.is_empty() {
            return Ok(None);
        }
        let inner = self.lock();
        let exact = inner.topics.iter().find(|t| t.name == query);
        Ok(exact
            .or_else(|| inner.topics.iter().find(|t| t.name.contains(&query)))
            .cloned())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let mut topics = self.lock().topics.clone();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }

    async fn documents_by_topic(&self, name: &str) -> Result<Vec<Document>> {
        let name = normalize_topic(name);
        let inner = self.lock();
        let Some(topic) = inner.topics.iter().find(|t| t.name == name) else {
            return Ok(Vec::new());
        };
        Ok(inner
            .documents
            .iter()
            .filter(|d| d.topic_id == topic.id)
            .cloned()
            .collect())
    }

    async fn cached_embedding(
        &self,
        document_id: i64,
        model: &str,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>> {
        Ok(self
            .lock()
            .vectors
            .get(&document_id)
            .filter(|v| v.model == model && v.content_hash == content_hash)
            .map(|v| v.vector.clone()))
    }

    async fn put_embedding(
        &self,
        document_id: i64,
        model: &str,
        content_hash: &str,
        vector: &[f32],
    ) -> Result<()> {
        self.lock().vectors.insert(
            document_id,
            StoredVector {
                model: model.to_string(),
                content_hash: content_hash.to_string(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }
}
