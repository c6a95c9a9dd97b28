// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider for delegated modules.
//!
//! Implements [`ProviderAdapter`] over the non-streaming Messages API.
//! API key resolution order: config, then `ANTHROPIC_API_KEY`. Without
//! either the provider is not built and delegated modules answer with the
//! configured fallback message.

pub mod client;
pub mod types;

use async_trait::async_trait;
use messenger_config::model::AnthropicConfig;
use messenger_core::types::{
    AdapterType, HealthStatus, MessageRole, ProviderMessage, ProviderRequest, ProviderResponse,
    TokenUsage,
};
use messenger_core::{MessengerError, PluginAdapter, ProviderAdapter};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

pub struct AnthropicProvider {
    client: AnthropicClient,
    default_model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, config: &AnthropicConfig) -> Result<Self, MessengerError> {
        let client = AnthropicClient::new(api_key, &config.api_version)?;
        Ok(Self::with_client(client, config))
    }

    /// Builds the provider when an API key is available, `None` otherwise.
    pub fn from_config(config: &AnthropicConfig) -> Result<Option<Self>, MessengerError> {
        let Some(api_key) = resolve_api_key(config.api_key.as_deref()) else {
            debug!("no Anthropic API key configured");
            return Ok(None);
        };
        let provider = Self::new(&api_key, config)?;
        info!(model = %config.default_model, "Anthropic provider initialized");
        Ok(Some(provider))
    }

    fn with_client(client: AnthropicClient, config: &AnthropicConfig) -> Self {
        Self {
            client,
            default_model: config.default_model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn to_message_request(&self, request: &ProviderRequest) -> Result<MessageRequest, MessengerError> {
        let (extra_system, messages) = convert_messages(&request.messages);
        if messages.is_empty() {
            return Err(MessengerError::InvalidInput(
                "completion request has no user message".into(),
            ));
        }

        let system = match (request.system_prompt.as_deref(), extra_system) {
            (Some(prompt), Some(extra)) => Some(format!("{prompt}\n\n{extra}")),
            (Some(prompt), None) => Some(prompt.to_string()),
            (None, extra) => extra,
        }
        .filter(|s| !s.trim().is_empty());

        Ok(MessageRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature,
            stream: false,
        })
    }
}

/// Maps transcript messages onto the alternating user/assistant turns the
/// API accepts.
///
/// System messages are moved into the system prompt. Consecutive messages
/// of one role are joined. Assistant turns before the first user message
/// are dropped since the API requires a user turn first.
fn convert_messages(messages: &[ProviderMessage]) -> (Option<String>, Vec<ApiMessage>) {
    let mut system = Vec::new();
    let mut out: Vec<ApiMessage> = Vec::new();

    for message in messages {
        let content = message.content.trim();
        if content.is_empty() {
            continue;
        }
        let role = match message.role {
            MessageRole::System => {
                system.push(content);
                continue;
            }
            MessageRole::User => "user",
            MessageRole::Assistant if out.is_empty() => continue,
            MessageRole::Assistant => "assistant",
        };
        match out.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(content);
            }
            _ => out.push(ApiMessage {
                role: role.to_string(),
                content: content.to_string(),
            }),
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, out)
}

fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
    match config_key {
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty()),
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
impl ProviderAdapter for AnthropicProvider {
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, MessengerError> {
        let api_request = self.to_message_request(&request)?;
        debug!(
            model = %api_request.model,
            turns = api_request.messages.len(),
            "sending completion request"
        );
        let response = self.client.complete_message(&api_request).await?;

        Ok(ProviderResponse {
            content: response.text(),
            id: response.id,
            model: response.model,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}
