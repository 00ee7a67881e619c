//! Core data models shared across Paperdesk.
//!
//! [`PaperRecord`] is what the source client produces and what the JSON
//! interchange files contain. [`Topic`] and [`Document`] are the stored
//! shapes returned by a [`Store`](crate::store::Store).

use serde::{Deserialize, Serialize};

/// A normalized paper that has not been stored yet.
///
/// Serialized as `{title, text, pdf_link, authors: [string]}`, which is
/// also the interchange file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    /// `title + ". " + summary`.
    pub text: String,
    pub pdf_link: String,
    pub authors: Vec<String>,
}

impl PaperRecord {
    /// Authors as stored in the `documents.authors` column.
    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

/// A research subject that documents are grouped under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub id: i64,
    /// Normalized name (see [`normalize_topic`]).
    pub name: String,
    /// Number of distinct documents inserted under this topic.
    pub document_count: i64,
}

/// A stored document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    pub topic_id: i64,
    pub title: String,
    pub text: String,
    pub pdf_link: String,
    /// Author list joined with `", "`.
    pub authors: String,
}

impl Document {
    /// Convert back into the interchange shape.
    pub fn to_record(&self) -> PaperRecord {
        let authors = self
            .authors
            .split(", ")
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|a| a.to_string())
            .collect();
        PaperRecord {
            title: self.title.clone(),
            text: self.text.clone(),
            pdf_link: self.pdf_link.clone(),
            authors,
        }
    }
}

/// Result of [`Store::add_document`](crate::store::Store::add_document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new row was written and the topic count incremented.
    Inserted(Document),
    /// A document with the same title already existed; nothing changed.
    Existing(Document),
}

impl AddOutcome {
    pub fn document(&self) -> &Document {
        match self {
            AddOutcome::Inserted(doc) | AddOutcome::Existing(doc) => doc,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, AddOutcome::Inserted(_))
    }
}

/// Normalize a topic name: trim surrounding whitespace and lowercase.
///
/// Idempotent, so `normalize_topic(normalize_topic(t)) == normalize_topic(t)`.
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_topic() {
        assert_eq!(normalize_topic(" Deep Learning "), "deep learning");
        assert_eq!(normalize_topic("deep learning"), "deep learning");
        assert_eq!(normalize_topic("\tAI\n"), "ai");
    }

    #[test]
    fn test_normalize_topic_idempotent() {
        let once = normalize_topic("  Neural  Networks ");
        assert_eq!(normalize_topic(&once), once);
    }

    #[test]
    fn test_document_to_record_splits_authors() {
        let doc = Document {
            id: 1,
            topic_id: 1,
            title: "T".to_string(),
            text: "T. S".to_string(),
            pdf_link: "http://arxiv.org/pdf/1.pdf".to_string(),
            authors: "Ada Lovelace, Alan Turing".to_string(),
        };
        let record = doc.to_record();
        assert_eq!(record.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(record.authors_joined(), doc.authors);
    }

    #[test]
    fn test_author_with_inner_comma_survives_round_trip() {
        let record = PaperRecord {
            title: "T".to_string(),
            text: "T. S".to_string(),
            pdf_link: "http://arxiv.org/pdf/1.pdf".to_string(),
            authors: vec!["Chen,Wei".to_string(), "Grace Hopper".to_string()],
        };
        let doc = Document {
            id: 1,
            topic_id: 1,
            title: record.title.clone(),
            text: record.text.clone(),
            pdf_link: record.pdf_link.clone(),
            authors: record.authors_joined(),
        };
        assert_eq!(doc.to_record(), record);
    }

    #[test]
    fn test_record_json_shape() {
        let record = PaperRecord {
            title: "A".to_string(),
            text: "A. b".to_string(),
            pdf_link: "http://arxiv.org/pdf/x.pdf".to_string(),
            authors: vec!["X".to_string()],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": "A",
                "text": "A. b",
                "pdf_link": "http://arxiv.org/pdf/x.pdf",
                "authors": ["X"]
            })
        );
    }
}
