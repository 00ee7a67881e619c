//! `topics` and `documents` commands.

use anyhow::Result;

use paperdesk_core::models::Topic;
use paperdesk_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_topics(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let topics = store.list_topics().await?;
    store.close().await;

    print_topic_table(&topics);
    Ok(())
}

/// Print topics and their document counts as a table.
pub fn print_topic_table(topics: &[Topic]) {
    if topics.is_empty() {
        println!("No topics yet.");
        return;
    }

    let width = topics
        .iter()
        .map(|t| t.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("TOPIC".len());

    println!("{:<width$}  {:>9}", "TOPIC", "DOCUMENTS", width = width);
    println!("{}", "-".repeat(width + 11));
    for topic in topics {
        println!(
            "{:<width$}  {:>9}",
            topic.name,
            topic.document_count,
            width = width
        );
    }
}

pub async fn run_documents(config: &Config, topic: &str) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let found = store.find_topic(topic).await?;
    let documents = match &found {
        Some(t) => store.documents_by_topic(&t.name).await?,
        None => Vec::new(),
    };
    store.close().await;

    let Some(found) = found else {
        println!("Warning: no documents found for topic '{}'.", topic.trim());
        return Ok(());
    };
    if documents.is_empty() {
        println!("Warning: no documents found for topic '{}'.", found.name);
        return Ok(());
    }

    println!("--- {} ({} documents) ---", found.name, documents.len());
    for (i, doc) in documents.iter().enumerate() {
        println!("{}. {}", i + 1, doc.title);
        if !doc.authors.is_empty() {
            println!("    authors: {}", doc.authors);
        }
        println!("    pdf: {}", doc.pdf_link);
    }
    Ok(())
}
