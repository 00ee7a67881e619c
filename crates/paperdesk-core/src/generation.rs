//! Generation trait and prompt construction.
//!
//! The answer prompt has the fixed shape
//! `"question: {query} context: {context}"` and is truncated to a token
//! budget before it reaches the model.
//!
//! Token counts are estimated at 4 characters per token; no tokenizer is
//! loaded.

use anyhow::Result;
use async_trait::async_trait;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Default input budget, in tokens.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 512;

/// Per-request generation knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Model override; `None` uses the provider's configured model.
    pub model: Option<String>,
    /// Maximum length of the generated answer, in tokens.
    pub max_length: usize,
    /// Beam count, forwarded to providers that support beam search.
    pub num_beams: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: None,
            max_length: 150,
            num_beams: 4,
        }
    }
}

/// Trait for text generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the configured model identifier.
    fn model_name(&self) -> &str;
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Join retrieved document texts into a single context string.
pub fn build_context<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts.into_iter().collect::<Vec<_>>().join(" ")
}

/// Build the answer prompt and cut it to `max_tokens`.
pub fn build_prompt(query: &str, context: &str, max_tokens: usize) -> String {
    let prompt = format!("question: {} context: {}", query, context);
    truncate_to_tokens(&prompt, max_tokens)
}

/// Truncate `text` to roughly `max_tokens` tokens.
///
/// Cuts at the last whitespace inside the budget when there is one, and
/// always on a char boundary.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut];

    match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => head[..pos].trim_end().to_string(),
        _ => head.to_string(),
    }
}

/// First `max_chars` characters of `text`, with `" ..."` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{} ...", head)
}
