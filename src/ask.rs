//! Retrieval-augmented question answering over a topic's documents.
//!
//! # Pipeline
//!
//! ```text
//! topic ──▶ documents ──▶ embed (reuse stored vectors) ──▶ FlatIndex
//!                                                             │
//! query ──▶ embed ──────────────────────────────▶ top-k ◀─────┘
//!                                                   │
//!                       context = texts joined by " "
//!                                                   │
//!          "question: {query} context: {context}" ──▶ generator ──▶ answer
//! ```
//!
//! A topic with no documents is not an error: [`answer`] returns
//! [`AskOutcome::NoDocuments`] and the front end shows a warning.

use anyhow::{bail, Result};
use serde::Serialize;

use paperdesk_core::embedding::{content_hash, embed_one, Embedder};
use paperdesk_core::generation::{
    build_context, build_prompt, preview, GenerationParams, TextGenerator,
};
use paperdesk_core::index::FlatIndex;
use paperdesk_core::models::Document;
use paperdesk_core::store::Store;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::sqlite_store::SqliteStore;

/// Per-call overrides of the configured retrieval and generation settings.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub top_k: Option<usize>,
    pub model: Option<String>,
    pub max_length: Option<usize>,
    pub num_beams: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AskRequest {
    pub query: String,
    pub topic: String,
    pub top_k: usize,
    pub max_input_tokens: usize,
    pub preview_chars: usize,
    pub params: GenerationParams,
}

impl AskRequest {
    /// Build a request from config defaults with `options` applied on top.
    pub fn from_config(config: &Config, query: &str, topic: &str, options: AskOptions) -> Self {
        let defaults = config.generation.params();
        Self {
            query: query.to_string(),
            topic: topic.to_string(),
            top_k: options.top_k.unwrap_or(config.retrieval.top_k).max(1),
            max_input_tokens: config.generation.max_input_tokens,
            preview_chars: config.retrieval.context_preview_chars,
            params: GenerationParams {
                model: options.model,
                max_length: options.max_length.unwrap_or(defaults.max_length),
                num_beams: options.num_beams.unwrap_or(defaults.num_beams),
            },
        }
    }
}

/// A document the answer was grounded on.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievedDocument {
    pub title: String,
    pub pdf_link: String,
    /// Squared L2 distance from the query vector.
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    /// The topic is unknown or has no documents yet.
    NoDocuments { topic: String },
    Answered {
        topic: String,
        retrieved: Vec<RetrievedDocument>,
        context_preview: String,
        answer: String,
    },
}

/// Answer `request.query` from the documents stored under `request.topic`.
pub async fn answer(
    store: &dyn Store,
    embedder: &dyn Embedder,
    generator: &dyn TextGenerator,
    request: &AskRequest,
) -> Result<AskOutcome> {
    let query = request.query.trim();
    if query.is_empty() {
        bail!("Query must not be empty");
    }

    let Some(topic) = store.find_topic(&request.topic).await? else {
        return Ok(AskOutcome::NoDocuments {
            topic: request.topic.trim().to_string(),
        });
    };

    let documents = store.documents_by_topic(&topic.name).await?;
    if documents.is_empty() {
        return Ok(AskOutcome::NoDocuments { topic: topic.name });
    }

    let vectors = document_vectors(store, embedder, &documents).await?;
    let index = FlatIndex::from_vectors(vectors)?;

    let query_vector = embed_one(embedder, query).await?;
    if query_vector.len() != index.dims() {
        bail!(
            "Query embedding has {} dimensions but the document index has {}",
            query_vector.len(),
            index.dims()
        );
    }
    let neighbors = index.search(&query_vector, request.top_k);

    let retrieved: Vec<&Document> = neighbors.iter().map(|n| &documents[n.index]).collect();
    let context = build_context(retrieved.iter().map(|d| d.text.as_str()));
    let prompt = build_prompt(query, &context, request.max_input_tokens);

    tracing::debug!(
        topic = %topic.name,
        retrieved = retrieved.len(),
        prompt_chars = prompt.len(),
        "generating answer"
    );
    let answer = generator.generate(&prompt, &request.params).await?;

    Ok(AskOutcome::Answered {
        topic: topic.name,
        retrieved: neighbors
            .iter()
            .map(|n| RetrievedDocument {
                title: documents[n.index].title.clone(),
                pdf_link: documents[n.index].pdf_link.clone(),
                distance: n.distance,
            })
            .collect(),
        context_preview: preview(&context, request.preview_chars),
        answer,
    })
}

/// One vector per document, in order. Stored vectors are reused when the
/// model, text hash and dimensionality still match; the rest are embedded in
/// one call and written back.
async fn document_vectors(
    store: &dyn Store,
    embedder: &dyn Embedder,
    documents: &[Document],
) -> Result<Vec<Vec<f32>>> {
    let model = embedder.model_name().to_string();
    let dims = embedder.dims();
    let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(documents.len());
    let mut missing = Vec::new();

    for (i, doc) in documents.iter().enumerate() {
        let hash = content_hash(&doc.text);
        let cached = store
            .cached_embedding(doc.id, &model, &hash)
            .await?
            .filter(|v| dims == 0 || v.len() == dims);
        if cached.is_none() {
            missing.push((i, hash));
        }
        vectors.push(cached);
    }

    if !missing.is_empty() {
        tracing::info!(count = missing.len(), model = %model, "embedding documents");
        let texts: Vec<String> = missing
            .iter()
            .map(|(i, _)| documents[*i].text.clone())
            .collect();
        let embedded = embedder.embed(&texts).await?;
        if embedded.len() != texts.len() {
            bail!(
                "Embedder returned {} vectors for {} documents",
                embedded.len(),
                texts.len()
            );
        }

        for ((i, hash), vector) in missing.into_iter().zip(embedded) {
            store
                .put_embedding(documents[i].id, &model, &hash, &vector)
                .await?;
            vectors[i] = Some(vector);
        }
    }

    vectors
        .into_iter()
        .map(|v| v.ok_or_else(|| anyhow::anyhow!("Missing document vector")))
        .collect()
}

/// CLI entry point for `paperdesk ask`.
pub async fn run_ask(config: &Config, query: &str, topic: &str, options: AskOptions) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let request = AskRequest::from_config(config, query, topic, options);

    let outcome = answer(&store, embedder.as_ref(), generator.as_ref(), &request).await;
    store.close().await;

    match outcome? {
        AskOutcome::NoDocuments { topic } => {
            println!(
                "Warning: no documents found for topic '{}'. Run `paperdesk fetch \"{}\"` first.",
                topic, topic
            );
        }
        AskOutcome::Answered {
            topic,
            retrieved,
            context_preview,
            answer,
        } => {
            println!("--- Retrieved documents ({}) ---", topic);
            for (i, doc) in retrieved.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, doc.distance, doc.title);
                println!("    pdf: {}", doc.pdf_link);
            }
            println!();
            println!("--- Context preview ---");
            println!("{}", context_preview);
            println!();
            println!("--- Answer ---");
            println!("{}", answer);
        }
    }

    Ok(())
}
