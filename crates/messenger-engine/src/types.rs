// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and result types of the engine entry points.

use messenger_core::types::{
    Conversation, ConversationStatus, Locale, Message, ModuleType,
};
use serde::{Deserialize, Serialize};

use crate::render::RenderedChoice;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub session_id: String,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub contact_id: Option<String>,
    /// Client language tag, normalized onto a supported locale.
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub conversation_id: String,
    pub first_message: String,
    pub locale: Locale,
    pub module_type: ModuleType,
    pub choices: Option<Vec<RenderedChoice>>,
    pub step_ref: String,
    /// True when an active conversation of the session was picked up again.
    pub resumed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub conversation_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub choice_id: Option<String>,
}

/// What a processed turn did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Reply accepted, conversation moved to another step.
    Advanced,
    /// Reply accepted on the last step.
    Completed,
    /// Reply did not fit the module; same step re-prompted.
    Rejected,
    /// Reply answered (FAQ or assistant) without moving.
    Answered,
    /// AI paused; the reply was recorded for a human agent.
    Paused,
    /// Parsed value read back for a yes/no answer; the step stays put.
    Confirming,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub success: bool,
    /// Assistant text to show; empty while paused.
    pub message: String,
    pub outcome: TurnOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step_ref: Option<String>,
    pub conversation_status: ConversationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<RenderedChoice>>,
    pub needs_human: bool,
}

/// A conversation with its transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}
