// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delegated assistant for LLM modules.
//!
//! The request carries the module prompt, the answers collected so far, the
//! best FAQ matches when the module asks for them, and the recent transcript.
//! Provider failures never fail the turn: they flag the conversation for a
//! human and answer with the configured fallback message.

use std::sync::Arc;
use std::time::Duration;

use messenger_config::model::EngineConfig;
use messenger_core::types::{
    Conversation, LlmConfig, Locale, LocalizedText, Message, MessageRole, ProviderMessage,
    ProviderRequest,
};
use messenger_core::{MessengerError, ProviderAdapter};
use messenger_faq::{FaqRetriever, format_faq_block};
use tracing::{debug, warn};

use crate::overlay::reasons;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_SYSTEM_PROMPT: &str = "You are Clara, the assistant of a leisure venue. \
Answer briefly and politely in the visitor's language.";

/// What the assistant answered, and whether a human must take over.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub escalation: Option<&'static str>,
}

pub struct Assistant {
    provider: Option<Arc<dyn ProviderAdapter>>,
    faq: Option<Arc<FaqRetriever>>,
    history_limit: usize,
    handoff_marker: String,
    fallback_message: LocalizedText,
}

impl Assistant {
    pub fn new(
        provider: Option<Arc<dyn ProviderAdapter>>,
        faq: Option<Arc<FaqRetriever>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            provider,
            faq,
            history_limit: config.history_limit,
            handoff_marker: config.handoff_marker.clone(),
            fallback_message: config.assistant_fallback_message.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Answers `user_message` for a delegated step.
    ///
    /// `history` is the stored transcript, oldest first, without the new
    /// message.
    pub async fn respond(
        &self,
        conversation: &Conversation,
        llm_config: &LlmConfig,
        module_prompt: &str,
        history: &[Message],
        user_message: &str,
        fallback_locale: Locale,
    ) -> AssistantReply {
        let fallback = || {
            self.fallback_message
                .resolve(conversation.locale, fallback_locale)
                .to_string()
        };
        let Some(provider) = &self.provider else {
            debug!(conversation_id = %conversation.id, "no provider for delegated step");
            return AssistantReply {
                text: fallback(),
                escalation: Some(reasons::ASSISTANT_UNAVAILABLE),
            };
        };

        let faq_block = if llm_config.use_faq_context {
            self.faq_context(user_message, conversation.locale, fallback_locale)
                .await
        } else {
            None
        };
        let request = ProviderRequest {
            model: llm_config.model.clone(),
            system_prompt: Some(system_prompt(
                llm_config,
                module_prompt,
                conversation,
                faq_block.as_deref(),
                &self.handoff_marker,
            )),
            messages: self.messages(history, user_message),
            max_tokens: llm_config.max_tokens,
            temperature: llm_config.temperature,
        };

        let result = match tokio::time::timeout(PROVIDER_TIMEOUT, provider.complete(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(MessengerError::Timeout {
                duration: PROVIDER_TIMEOUT,
            }),
        };
        let content = match result {
            Ok(response) => response.content,
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "assistant call failed");
                return AssistantReply {
                    text: fallback(),
                    escalation: Some(reasons::ASSISTANT_ERROR),
                };
            }
        };

        let handoff = !self.handoff_marker.is_empty() && content.contains(&self.handoff_marker);
        let text = if handoff {
            content.replace(&self.handoff_marker, "")
        } else {
            content
        };
        let text = text.trim();

        match (handoff, text.is_empty()) {
            (true, true) => AssistantReply {
                text: fallback(),
                escalation: Some(reasons::ASSISTANT_HANDOFF),
            },
            (true, false) => AssistantReply {
                text: text.to_string(),
                escalation: Some(reasons::ASSISTANT_HANDOFF),
            },
            (false, true) => AssistantReply {
                text: fallback(),
                escalation: Some(reasons::ASSISTANT_EMPTY_RESPONSE),
            },
            (false, false) => AssistantReply {
                text: text.to_string(),
                escalation: None,
            },
        }
    }

    async fn faq_context(&self, query: &str, locale: Locale, fallback: Locale) -> Option<String> {
        let faq = self.faq.as_ref()?;
        match faq.search(query, locale, fallback).await {
            Ok(matches) => Some(format_faq_block(&matches, locale, fallback)),
            Err(e) => {
                warn!(error = %e, "FAQ context lookup failed");
                None
            }
        }
    }

    /// The last `history_limit` user and assistant turns plus the new message.
    fn messages(&self, history: &[Message], user_message: &str) -> Vec<ProviderMessage> {
        let turns: Vec<&Message> = history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .collect();
        let skip = turns.len().saturating_sub(self.history_limit);
        turns
            .into_iter()
            .skip(skip)
            .map(|m| ProviderMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .chain(std::iter::once(ProviderMessage {
                role: MessageRole::User,
                content: user_message.to_string(),
            }))
            .collect()
    }
}

fn system_prompt(
    llm_config: &LlmConfig,
    module_prompt: &str,
    conversation: &Conversation,
    faq_block: Option<&str>,
    handoff_marker: &str,
) -> String {
    let base = llm_config
        .system_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut sections = vec![base.trim().to_string()];
    if !module_prompt.trim().is_empty() {
        sections.push(format!("Current step prompt:\n{}", module_prompt.trim()));
    }
    sections.push(format!(
        "Visitor language: {}",
        conversation.locale.as_str()
    ));
    if !conversation.collected_data.is_empty() {
        let data = serde_json::to_string(&conversation.collected_data).unwrap_or_default();
        sections.push(format!("Collected data:\n{data}"));
    }
    if let Some(block) = faq_block {
        sections.push(format!("FAQ:\n{block}"));
    }
    if !handoff_marker.is_empty() {
        sections.push(format!(
            "If you cannot help or the visitor asks for a person, include {handoff_marker} in your reply."
        ));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, scripted};
    use chrono::Utc;
    use messenger_core::types::{CollectedData, ConversationStatus};

    fn conversation() -> Conversation {
        let now = Utc::now();
        Conversation {
            id: "c1".into(),
            session_id: "s1".into(),
            branch_id: None,
            contact_id: None,
            workflow_id: "w1".into(),
            current_step_ref: Some("INFO".into()),
            status: ConversationStatus::Active,
            locale: Locale::En,
            collected_data: CollectedData::from([("ASK_NAME".to_string(), "Dana".to_string())]),
            started_at: now,
            last_activity_at: now,
            completed_at: None,
            clara_paused: false,
            clara_paused_until: None,
            needs_human: false,
            needs_human_reason: None,
            last_message: None,
            version: 0,
        }
    }

    fn message(role: MessageRole, content: &str) -> Message {
        Message {
            id: content.into(),
            conversation_id: "c1".into(),
            role,
            content: content.into(),
            step_ref: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    fn assistant(provider: Option<Arc<ScriptedProvider>>, history_limit: usize) -> Assistant {
        Assistant::new(
            provider.map(|p| p as Arc<dyn ProviderAdapter>),
            None,
            &EngineConfig {
                history_limit,
                ..Default::default()
            },
        )
    }

    async fn respond(assistant: &Assistant, history: &[Message]) -> AssistantReply {
        assistant
            .respond(
                &conversation(),
                &LlmConfig::default(),
                "Ask what they need.",
                history,
                "Do you host birthdays?",
                Locale::Fr,
            )
            .await
    }

    #[tokio::test]
    async fn reply_is_returned_and_request_is_assembled() {
        let provider = scripted(Ok("Yes, every weekend."));
        let assistant = assistant(Some(provider.clone()), 2);
        let history = [
            message(MessageRole::Assistant, "Welcome"),
            message(MessageRole::User, "Hi"),
            message(MessageRole::System, "note"),
            message(MessageRole::Assistant, "How can I help?"),
        ];

        let reply = respond(&assistant, &history).await;
        assert_eq!(
            reply,
            AssistantReply {
                text: "Yes, every weekend.".into(),
                escalation: None
            }
        );

        let request = provider.last.lock().unwrap().clone().unwrap();
        let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Hi", "How can I help?", "Do you host birthdays?"]);
        let system = request.system_prompt.unwrap();
        assert!(system.contains("Ask what they need."));
        assert!(system.contains("\"ASK_NAME\":\"Dana\""));
        assert!(system.contains("[[HANDOFF]]"));
    }

    #[tokio::test]
    async fn handoff_marker_escalates_and_is_stripped() {
        let assistant = assistant(Some(scripted(Ok("Let me get a colleague. [[HANDOFF]]"))), 20);
        let reply = respond(&assistant, &[]).await;
        assert_eq!(reply.text, "Let me get a colleague.");
        assert_eq!(reply.escalation, Some(reasons::ASSISTANT_HANDOFF));
    }

    #[tokio::test]
    async fn failures_fall_back_and_escalate() {
        let fallback = EngineConfig::default()
            .assistant_fallback_message
            .resolve(Locale::En, Locale::Fr)
            .to_string();

        let reply = respond(&assistant(Some(scripted(Err("boom"))), 20), &[]).await;
        assert_eq!(reply.text, fallback);
        assert_eq!(reply.escalation, Some(reasons::ASSISTANT_ERROR));

        let reply = respond(&assistant(Some(scripted(Ok("   "))), 20), &[]).await;
        assert_eq!(reply.escalation, Some(reasons::ASSISTANT_EMPTY_RESPONSE));

        let reply = respond(&assistant(None, 20), &[]).await;
        assert_eq!(reply.text, fallback);
        assert_eq!(reply.escalation, Some(reasons::ASSISTANT_UNAVAILABLE));
    }
}
