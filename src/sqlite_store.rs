//! SQLite-backed [`Store`] implementation.
//!
//! `add_document` runs the topic upsert, the title-unique insert, and the
//! count increment in one transaction, so two callers racing on the same
//! title cannot both insert or both count it.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use paperdesk_core::embedding::{blob_to_vec, vec_to_blob};
use paperdesk_core::models::{normalize_topic, AddOutcome, Document, PaperRecord, Topic};
use paperdesk_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// SQLite implementation of the [`Store`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::create_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_topic(row: &SqliteRow) -> Topic {
    Topic {
        id: row.get("id"),
        name: row.get("name"),
        document_count: row.get("document_count"),
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        title: row.get("title"),
        text: row.get("text"),
        pdf_link: row.get("pdf_link"),
        authors: row.get("authors"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn add_document(&self, topic: &str, record: &PaperRecord) -> Result<AddOutcome> {
        let name = normalize_topic(topic);
        let authors = record.authors_joined();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO topics (name, document_count) VALUES (?, 0) ON CONFLICT(name) DO NOTHING",
        )
        .bind(&name)
        .execute(&mut *tx)
        .await?;

        let topic_id: i64 = sqlx::query_scalar("SELECT id FROM topics WHERE name = ?")
            .bind(&name)
            .fetch_one(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (topic_id, title, text, pdf_link, authors)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(title) DO NOTHING
            "#,
        )
        .bind(topic_id)
        .bind(&record.title)
        .bind(&record.text)
        .bind(&record.pdf_link)
        .bind(&authors)
        .execute(&mut *tx)
        .await?;

        let outcome = if inserted.rows_affected() == 1 {
            sqlx::query("UPDATE topics SET document_count = document_count + 1 WHERE id = ?")
                .bind(topic_id)
                .execute(&mut *tx)
                .await?;

            AddOutcome::Inserted(Document {
                id: inserted.last_insert_rowid(),
                topic_id,
                title: record.title.clone(),
                text: record.text.clone(),
                pdf_link: record.pdf_link.clone(),
                authors,
            })
        } else {
            let row = sqlx::query(
                "SELECT id, topic_id, title, text, pdf_link, authors FROM documents WHERE title = ?",
            )
            .bind(&record.title)
            .fetch_one(&mut *tx)
            .await?;
            AddOutcome::Existing(row_to_document(&row))
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn get_topic(&self, name: &str) -> Result<Option<Topic>> {
        let row = sqlx::query("SELECT id, name, document_count FROM topics WHERE name = ?")
            .bind(normalize_topic(name))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_topic))
    }

    async fn find_topic(&self, query: &str) -> Result<Option<Topic>> {
        let query = normalize_topic(query);
        if query.is_empty() {
            return Ok(None);
        }

        if let Some(topic) = self.get_topic(&query).await? {
            return Ok(Some(topic));
        }

        let row = sqlx::query(
            "SELECT id, name, document_count FROM topics WHERE instr(name, ?) > 0 ORDER BY id LIMIT 1",
        )
        .bind(&query)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_topic))
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query("SELECT id, name, document_count FROM topics ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_topic).collect())
    }

    async fn documents_by_topic(&self, name: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.topic_id, d.title, d.text, d.pdf_link, d.authors
            FROM documents d
            JOIN topics t ON t.id = d.topic_id
            WHERE t.name = ?
            ORDER BY d.id
            "#,
        )
        .bind(normalize_topic(name))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn cached_embedding(
        &self,
        document_id: i64,
        model: &str,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT embedding FROM document_embeddings WHERE document_id = ? AND model = ? AND content_hash = ?",
        )
        .bind(document_id)
        .bind(model)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    async fn put_embedding(
        &self,
        document_id: i64,
        model: &str,
        content_hash: &str,
        vector: &[f32],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_embeddings (document_id, model, dims, content_hash, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                content_hash = excluded.content_hash,
                embedding = excluded.embedding
            "#,
        )
        .bind(document_id)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(content_hash)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("data").join("test.sqlite");
        let cfg = parse_config(&format!(
            "[db]\npath = \"{}\"\n",
            db_path.display().to_string().replace('\\', "/")
        ))
        .unwrap();
        let store = SqliteStore::connect(&cfg).await.unwrap();
        (tmp, store)
    }

    fn record(title: &str) -> PaperRecord {
        PaperRecord {
            title: title.to_string(),
            text: format!("{}. An abstract.", title),
            pdf_link: format!("http://arxiv.org/pdf/{}.pdf", title),
            authors: vec!["Grace Hopper".to_string(), "Edsger Dijkstra".to_string()],
        }
    }

    #[tokio::test]
    async fn test_add_document_inserts_and_counts() {
        let (_tmp, store) = store().await;
        let out = store.add_document("Deep Learning", &record("p1")).await.unwrap();
        assert!(out.is_inserted());
        assert_eq!(out.document().authors, "Grace Hopper, Edsger Dijkstra");

        let topic = store.get_topic(" deep learning ").await.unwrap().unwrap();
        assert_eq!(topic.name, "deep learning");
        assert_eq!(topic.document_count, 1);
        assert_eq!(out.document().topic_id, topic.id);
    }

    #[tokio::test]
    async fn test_duplicate_title_is_idempotent() {
        let (_tmp, store) = store().await;
        let first = store.add_document("ai", &record("same")).await.unwrap();
        let again = store.add_document("ai", &record("same")).await.unwrap();
        let other = store.add_document("ml", &record("same")).await.unwrap();

        assert!(first.is_inserted());
        assert!(!again.is_inserted());
        assert!(!other.is_inserted());
        assert_eq!(other.document(), first.document());

        assert_eq!(store.get_topic("ai").await.unwrap().unwrap().document_count, 1);
        assert_eq!(store.get_topic("ml").await.unwrap().unwrap().document_count, 0);
        assert_eq!(store.documents_by_topic("ai").await.unwrap().len(), 1);
        assert!(store.documents_by_topic("ml").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_inserts_count_once() {
        let (_tmp, store) = store().await;
        let a = store.clone();
        let b = store.clone();
        let (ra, rb) = tokio::join!(
            async move { a.add_document("ai", &record("race")).await },
            async move { b.add_document("ai", &record("race")).await },
        );
        let inserted = [ra.unwrap(), rb.unwrap()]
            .iter()
            .filter(|o| o.is_inserted())
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.get_topic("ai").await.unwrap().unwrap().document_count, 1);
    }

    #[tokio::test]
    async fn test_find_topic_substring_fallback() {
        let (_tmp, store) = store().await;
        store.add_document("deep learning", &record("a")).await.unwrap();
        store.add_document("reinforcement learning", &record("b")).await.unwrap();

        assert_eq!(
            store.find_topic("DEEP").await.unwrap().unwrap().name,
            "deep learning"
        );
        // First by id wins for ambiguous fragments
        assert_eq!(
            store.find_topic("learning").await.unwrap().unwrap().name,
            "deep learning"
        );
        assert!(store.find_topic("quantum").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_topics_and_documents_order() {
        let (_tmp, store) = store().await;
        store.add_document("nlp", &record("n1")).await.unwrap();
        store.add_document("cv", &record("c1")).await.unwrap();
        store.add_document("nlp", &record("n2")).await.unwrap();

        let topics = store.list_topics().await.unwrap();
        let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["cv", "nlp"]);

        let docs = store.documents_by_topic("NLP").await.unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["n1", "n2"]);
    }

    #[tokio::test]
    async fn test_embedding_roundtrip_and_staleness() {
        let (_tmp, store) = store().await;
        let doc = store.add_document("ai", &record("e")).await.unwrap();
        let id = doc.document().id;

        store.put_embedding(id, "mini", "h1", &[0.5, -1.0]).await.unwrap();
        assert_eq!(
            store.cached_embedding(id, "mini", "h1").await.unwrap(),
            Some(vec![0.5, -1.0])
        );
        assert!(store.cached_embedding(id, "mini", "h2").await.unwrap().is_none());

        store.put_embedding(id, "mini", "h2", &[1.0, 1.0]).await.unwrap();
        assert_eq!(
            store.cached_embedding(id, "mini", "h2").await.unwrap(),
            Some(vec![1.0, 1.0])
        );
    }
}
