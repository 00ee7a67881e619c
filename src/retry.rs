//! JSON POST with retry, shared by the HTTP embedding and generation
//! providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

/// POST `body` to `url` and return the decoded JSON response.
///
/// `label` names the provider in error messages (e.g. `"OpenAI"`).
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(provider = label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        label,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    label,
                    url,
                    e
                ));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", label)))
}


#[cfg(test)]
mod tests {
    use super::test_server::scripted;
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_success_first_try() {
        let (base, requests) = scripted("/echo", vec![(StatusCode::OK, json!({"ok": true}))]).await;
        let client = reqwest::Client::new();
        let out = post_json(&client, &format!("{}/echo", base), None, &json!({"x": 1}), 3, "Test")
            .await
            .unwrap();
        assert_eq!(out, json!({"ok": true}));
        assert_eq!(requests.lock().unwrap()[0], json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let (base, requests) = scripted(
            "/echo",
            vec![(StatusCode::BAD_REQUEST, json!({"error": "bad"}))],
        )
        .await;
        let client = reqwest::Client::new();
        let err = post_json(&client, &format!("{}/echo", base), None, &json!({}), 3, "Test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Test API error 400"));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let (base, requests) = scripted(
            "/echo",
            vec![
                (StatusCode::SERVICE_UNAVAILABLE, json!({})),
                (StatusCode::OK, json!({"ok": 2})),
            ],
        )
        .await;
        let client = reqwest::Client::new();
        let out = post_json(&client, &format!("{}/echo", base), None, &json!({}), 1, "Test")
            .await
            .unwrap();
        assert_eq!(out, json!({"ok": 2}));
        assert_eq!(requests.lock().unwrap().len(), 2);
    }
}
