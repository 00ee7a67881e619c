//! Text generation providers.
//!
//! Concrete [`TextGenerator`]s behind `[generation] provider`:
//! - **[`DisabledGenerator`]**: returns errors.
//! - **[`OpenAiGenerator`]**: OpenAI-compatible `POST /chat/completions`.
//! - **[`OllamaGenerator`]**: Ollama `POST /api/generate` (non-streaming).
//!
//! Neither HTTP API exposes beam search, so `num_beams` is accepted and
//! logged but has no effect on the request.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use paperdesk_core::generation::{GenerationParams, TextGenerator};

use crate::config::GenerationConfig;
use crate::retry::post_json;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

fn http_client(config: &GenerationConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn required_model(config: &GenerationConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("generation.model required for {} provider", provider))
}

pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in the config file.")
    }
}

/// Generator using an OpenAI-compatible chat completions endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            model: required_model(config, "OpenAI")?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let model = params.model.as_deref().unwrap_or(&self.model);
        tracing::debug!(
            model,
            max_length = params.max_length,
            num_beams = params.num_beams,
            "generating"
        );

        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": params.max_length,
        });
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let json = post_json(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
    }
}

/// Generator using a local Ollama instance.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            model: required_model(config, "Ollama")?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let model = params.model.as_deref().unwrap_or(&self.model);
        tracing::debug!(
            model,
            max_length = params.max_length,
            num_beams = params.num_beams,
            "generating"
        );

        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "num_predict": params.max_length },
        });
        let url = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let json = post_json(&self.client, &url, None, &body, self.max_retries, "Ollama").await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.trim().to_string())
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
    }
}

/// Build the [`TextGenerator`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::test_server::scripted;
    use axum::http::StatusCode;
    use serde_json::json;

    fn config(provider: &str, url: &str) -> GenerationConfig {
        GenerationConfig {
            provider: provider.to_string(),
            model: Some("small-model".to_string()),
            max_retries: 0,
            url: Some(url.to_string()),
            ..GenerationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let generator = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.model_name(), "disabled");
        assert!(generator
            .generate("question: q context: c", &GenerationParams::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ollama_generate_request_shape() {
        let (base, requests) = scripted(
            "/api/generate",
            vec![(StatusCode::OK, json!({"response": "  Transformers.  ", "done": true}))],
        )
        .await;
        let generator = OllamaGenerator::new(&config("ollama", &base)).unwrap();

        let params = GenerationParams {
            max_length: 64,
            ..GenerationParams::default()
        };
        let answer = generator.generate("question: q context: c", &params).await.unwrap();

        assert_eq!(answer, "Transformers.");
        let requests = requests.lock().unwrap();
        assert_eq!(requests[0]["model"], "small-model");
        assert_eq!(requests[0]["stream"], false);
        assert_eq!(requests[0]["options"]["num_predict"], 64);
    }

    #[tokio::test]
    async fn test_openai_generate_uses_model_override() {
        let (base, requests) = scripted(
            "/chat/completions",
            vec![(
                StatusCode::OK,
                json!({"choices": [{"message": {"role": "assistant", "content": "An answer"}}]}),
            )],
        )
        .await;
        let generator =
            OpenAiGenerator::with_api_key(&config("openai", &base), "sk-test".to_string()).unwrap();

        let params = GenerationParams {
            model: Some("bigger-model".to_string()),
            ..GenerationParams::default()
        };
        let answer = generator.generate("question: q context: c", &params).await.unwrap();

        assert_eq!(answer, "An answer");
        let requests = requests.lock().unwrap();
        assert_eq!(requests[0]["model"], "bigger-model");
        assert_eq!(requests[0]["max_tokens"], 150);
        assert_eq!(requests[0]["messages"][0]["content"], "question: q context: c");
    }

    #[tokio::test]
    async fn test_openai_malformed_response() {
        let (base, _requests) =
            scripted("/chat/completions", vec![(StatusCode::OK, json!({"choices": []}))]).await;
        let generator =
            OpenAiGenerator::with_api_key(&config("openai", &base), "sk-test".to_string()).unwrap();
        assert!(generator
            .generate("p", &GenerationParams::default())
            .await
            .is_err());
    }
}
