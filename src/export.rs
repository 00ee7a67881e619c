//! JSON interchange files.
//!
//! A topic's documents can be written to, and loaded from, a JSON array of
//! `{title, text, pdf_link, authors}` objects. The default export location is
//! `data/raw/arxiv_<topic>_documents.json`, with spaces in the topic
//! replaced by underscores.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use paperdesk_core::models::{normalize_topic, PaperRecord};
use paperdesk_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Where `export` writes when no path is given.
pub fn default_export_path(topic: &str) -> PathBuf {
    let slug = normalize_topic(topic).replace(' ', "_");
    PathBuf::from("data")
        .join("raw")
        .join(format!("arxiv_{}_documents.json", slug))
}

/// Records stored under `topic`, or `None` when the topic does not exist.
pub async fn export_records(store: &dyn Store, topic: &str) -> Result<Option<Vec<PaperRecord>>> {
    if store.get_topic(topic).await?.is_none() {
        return Ok(None);
    }
    let documents = store.documents_by_topic(topic).await?;
    Ok(Some(documents.iter().map(|d| d.to_record()).collect()))
}

/// Parse an interchange file body.
pub fn parse_records(json: &str) -> Result<Vec<PaperRecord>> {
    serde_json::from_str(json)
        .context("Invalid interchange file: expected a JSON array of documents")
}

/// Export a topic's documents as JSON.
///
/// `output` of `-` writes to stdout for piping; `None` uses
/// [`default_export_path`].
pub async fn run_export(config: &Config, topic: &str, output: Option<&Path>) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let records = export_records(&store, topic).await;
    store.close().await;

    let Some(records) = records? else {
        anyhow::bail!("Unknown topic: '{}'", topic.trim());
    };
    let json = serde_json::to_string_pretty(&records)?;

    match output {
        Some(path) if path == Path::new("-") => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(json.as_bytes())?;
            handle.write_all(b"\n")?;
        }
        _ => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| default_export_path(topic));
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} documents to {}", records.len(), path.display());
        }
    }

    Ok(())
}

/// Load an interchange file into the store under `topic`.
pub async fn run_import(config: &Config, file: &Path, topic: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records = parse_records(&content)?;

    let store = SqliteStore::connect(config).await?;
    let inserted = store.add_documents(topic, &records).await;
    store.close().await;
    let inserted = inserted?;

    println!(
        "Imported {} documents into '{}' ({} new, {} already stored)",
        records.len(),
        normalize_topic(topic),
        inserted,
        records.len() - inserted
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdesk_core::store::memory::InMemoryStore;

    #[test]
    fn test_default_export_path() {
        assert_eq!(
            default_export_path(" Deep Learning "),
            PathBuf::from("data/raw/arxiv_deep_learning_documents.json")
        );
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records(
            r#"[{"title": "A", "text": "A. b", "pdf_link": "http://arxiv.org/pdf/1.pdf", "authors": ["X", "Y"]}]"#,
        )
        .unwrap();
        assert_eq!(records[0].authors_joined(), "X, Y");
        assert!(parse_records(r#"{"title": "A"}"#).is_err());
    }

    #[tokio::test]
    async fn test_export_preserves_insertion_order() {
        let store = InMemoryStore::new();
        let records: Vec<PaperRecord> = ["second", "first"]
            .iter()
            .map(|t| PaperRecord {
                title: t.to_string(),
                text: format!("{}. x", t),
                pdf_link: format!("http://arxiv.org/pdf/{}.pdf", t),
                authors: vec!["A".to_string(), "B".to_string()],
            })
            .collect();
        store.add_documents("ai", &records).await.unwrap();

        let exported = export_records(&store, "AI").await.unwrap().unwrap();
        assert_eq!(exported, records);
        assert!(export_records(&store, "ml").await.unwrap().is_none());
    }
}
