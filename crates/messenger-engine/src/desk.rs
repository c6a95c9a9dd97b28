// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent desk operations over conversation state.
//!
//! These run outside the state machine: none of them moves the step cursor.
//! Every conversation handed back goes through `current`, so an elapsed
//! pause window never shows as paused.

use std::sync::Arc;

use chrono::Utc;
use messenger_core::types::{
    Conversation, ConversationFilter, ConversationStatus, Message, NewMessage,
};
use messenger_core::{MessengerError, StorageAdapter};
use tracing::info;

use crate::overlay::{clear_expired_pause, pause_window};
use crate::types::ConversationDetail;

/// The conversation as the engine would see it now.
fn current(mut conversation: Conversation) -> Conversation {
    clear_expired_pause(&mut conversation, Utc::now());
    conversation
}

#[derive(Clone)]
pub struct AgentDesk {
    storage: Arc<dyn StorageAdapter>,
    fallback_minutes: u32,
}

impl AgentDesk {
    /// `fallback_minutes` is the pause window used when the settings row
    /// carries none.
    pub fn new(storage: Arc<dyn StorageAdapter>, fallback_minutes: u32) -> Self {
        Self {
            storage,
            fallback_minutes,
        }
    }

    pub async fn list(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, MessengerError> {
        let conversations = self.storage.list_conversations(filter).await?;
        Ok(conversations.into_iter().map(current).collect())
    }

    pub async fn detail(&self, conversation_id: &str) -> Result<ConversationDetail, MessengerError> {
        let conversation = self
            .storage
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| MessengerError::not_found("conversation", conversation_id))?;
        let messages = self.storage.list_messages(conversation_id).await?;
        Ok(ConversationDetail {
            conversation: current(conversation),
            messages,
        })
    }

    /// Posts an agent message and opens (or extends) the AI pause.
    pub async fn send(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<(Conversation, Message), MessengerError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessengerError::InvalidInput("message must not be empty".into()));
        }
        let settings = self.storage.get_settings().await?;
        let until = Utc::now() + pause_window(&settings, self.fallback_minutes);
        let (conversation, message) = self
            .storage
            .agent_send(conversation_id, &NewMessage::agent(content), until)
            .await?;
        info!(conversation_id, paused_until = %until, "agent message sent");
        Ok((current(conversation), message))
    }

    /// Manual pause without expiry, or resume.
    pub async fn set_paused(
        &self,
        conversation_id: &str,
        paused: bool,
    ) -> Result<Conversation, MessengerError> {
        let conversation = self
            .storage
            .set_clara_paused(conversation_id, paused, None)
            .await?;
        info!(conversation_id, paused, "AI pause toggled");
        Ok(current(conversation))
    }

    pub async fn resolve_human(&self, conversation_id: &str) -> Result<Conversation, MessengerError> {
        self.storage.resolve_human(conversation_id).await.map(current)
    }

    pub async fn close(&self, conversation_id: &str) -> Result<Conversation, MessengerError> {
        self.finish(conversation_id, ConversationStatus::Completed)
            .await
    }

    pub async fn abandon(&self, conversation_id: &str) -> Result<Conversation, MessengerError> {
        self.finish(conversation_id, ConversationStatus::Abandoned)
            .await
    }

    async fn finish(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, MessengerError> {
        let conversation = self
            .storage
            .close_conversation(conversation_id, status)
            .await?;
        info!(conversation_id, status = %status, "conversation closed by agent");
        Ok(current(conversation))
    }

    pub async fn link_contact(
        &self,
        conversation_id: &str,
        contact_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Conversation, MessengerError> {
        let contact_id = contact_id.trim();
        if contact_id.is_empty() {
            return Err(MessengerError::InvalidInput("contactId is required".into()));
        }
        let branch_id = branch_id.map(str::trim).filter(|b| !b.is_empty());
        self.storage
            .link_contact(conversation_id, contact_id, branch_id)
            .await
            .map(current)
    }
}
