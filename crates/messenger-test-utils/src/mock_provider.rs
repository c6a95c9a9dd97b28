// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with pre-configured responses,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use messenger_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
};
use messenger_core::{MessengerError, PluginAdapter, ProviderAdapter};

/// A mock LLM provider that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned. A queued `Err` makes the
/// call fail with a provider error.
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with an empty response queue.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock provider pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response to the end of the queue.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.responses.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a failing call.
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.responses.lock().await.push_back(Err(message.into()));
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_response(&self) -> Result<String, String> {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("mock response".to_string()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, MessengerError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MessengerError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MessengerError> {
        let model = request.model.clone().unwrap_or_else(|| "mock-model".into());
        self.requests.lock().await.push(request);
        let text = self
            .next_response()
            .await
            .map_err(|message| MessengerError::Provider {
                message,
                source: None,
            })?;
        Ok(ProviderResponse {
            id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
            content: text,
            model,
            stop_reason: Some("end_turn".to_string()),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_core::types::{MessageRole, ProviderMessage};

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: Some("test-model".into()),
            messages: vec![ProviderMessage {
                role: MessageRole::User,
                content: "hi".into(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let provider = MockProvider::new();
        let resp = provider.complete(request()).await.unwrap();
        assert_eq!(resp.content, "mock response");
        assert_eq!(resp.model, "test-model");
    }

    #[tokio::test]
    async fn queued_responses_returned_in_order() {
        let provider = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(provider.complete(request()).await.unwrap().content, "first");
        assert_eq!(provider.complete(request()).await.unwrap().content, "second");
        // Queue exhausted, falls back to default
        assert_eq!(
            provider.complete(request()).await.unwrap().content,
            "mock response"
        );
        assert_eq!(provider.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn queued_failure_is_a_provider_error() {
        let provider = MockProvider::new();
        provider.add_failure("overloaded").await;
        provider.add_response("recovered").await;
        assert!(matches!(
            provider.complete(request()).await,
            Err(MessengerError::Provider { .. })
        ));
        assert_eq!(provider.complete(request()).await.unwrap().content, "recovered");
    }
}
