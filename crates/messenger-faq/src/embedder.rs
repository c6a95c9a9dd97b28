// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible embeddings client.
//!
//! Posts batches to `{base_url}/embeddings` and returns vectors in input
//! order. Transient failures (429, 500, 503) are retried once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use messenger_config::model::EmbeddingConfig;
use messenger_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use messenger_core::{EmbeddingAdapter, MessengerError, PluginAdapter};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Embedding adapter backed by the OpenAI `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, MessengerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                MessengerError::Config(format!("invalid embedding API key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MessengerError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            max_retries: 1,
        })
    }

    /// Build an embedder from configuration.
    ///
    /// Returns `None` when neither `embedding.api_key` nor `OPENAI_API_KEY`
    /// is set; FAQ lookup then runs on keywords only.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Option<Self>, MessengerError> {
        let Some(api_key) = resolve_api_key(config.api_key.as_deref()) else {
            debug!("no embedding API key configured");
            return Ok(None);
        };
        Self::new(&api_key, &config.base_url, &config.model).map(Some)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MessengerError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying embedding request after transient error");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| MessengerError::Provider {
                    message: format!("embedding request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, inputs = texts.len(), "embedding response received");

            if status.is_success() {
                let parsed: EmbeddingResponse =
                    response.json().await.map_err(|e| MessengerError::Provider {
                        message: format!("failed to parse embedding response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                let mut data = parsed.data;
                data.sort_by_key(|d| d.index);
                return Ok(data.into_iter().map(|d| d.embedding).collect());
            }

            let text = response.text().await.unwrap_or_default();
            let error = MessengerError::Provider {
                message: format!("embedding API returned {status}: {text}"),
                source: None,
            };
            if is_transient_error(status) && attempt < self.max_retries {
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| MessengerError::Provider {
            message: "embedding request failed after retries".into(),
            source: None,
        }))
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
    match config_key {
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty()),
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embeddings"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MessengerError> {
        // No probe request: embedding calls are billed.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MessengerError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MessengerError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: 0,
            });
        }
        let embeddings = self.request(&input.texts).await?;
        if embeddings.len() != input.texts.len() {
            return Err(MessengerError::Provider {
                message: format!(
                    "embedding API returned {} vectors for {} inputs",
                    embeddings.len(),
                    input.texts.len()
                ),
                source: None,
            });
        }
        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> OpenAiEmbedder {
        OpenAiEmbedder::new("sk-test", &server.uri(), "text-embedding-3-small").unwrap()
    }

    fn input(texts: &[&str]) -> EmbeddingInput {
        EmbeddingInput {
            texts: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn embed_returns_vectors_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let output = embedder(&server)
            .embed(input(&["first", "second"]))
            .await
            .unwrap();
        assert_eq!(output.dimensions, 2);
        assert_eq!(output.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_retries_once_on_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.5]}]
            })))
            .mount(&server)
            .await;

        let output = embedder(&server).embed(input(&["q"])).await.unwrap();
        assert_eq!(output.embeddings, vec![vec![0.5]]);
    }

    #[tokio::test]
    async fn embed_fails_on_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = embedder(&server).embed(input(&["q"])).await.unwrap_err();
        assert!(matches!(err, MessengerError::Provider { .. }));
        assert!(err.to_string().contains("401"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_input_skips_the_request() {
        let server = MockServer::start().await;
        let output = embedder(&server).embed(input(&[])).await.unwrap();
        assert!(output.embeddings.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn configured_key_wins_over_environment() {
        assert_eq!(resolve_api_key(Some("sk-config")).as_deref(), Some("sk-config"));
    }
}
