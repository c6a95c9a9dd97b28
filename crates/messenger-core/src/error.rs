// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the messenger conversation engine.

use thiserror::Error;

use crate::types::ConversationStatus;

/// The primary error type used across all adapter traits and engine operations.
///
/// User input that does not fit a module (failed validation, unknown choice)
/// is not an error: the engine reports it as a rejected turn.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// Application configuration errors (invalid TOML, bad values, missing keys).
    #[error("configuration error: {0}")]
    Config(String),

    /// Workflow content is unusable at runtime: no active workflow, missing
    /// entry point, dangling step or module reference, unknown validation format.
    #[error("workflow configuration error: {0}")]
    WorkflowConfig(String),

    /// A message was sent to a conversation that already reached a terminal state.
    #[error("conversation {conversation_id} is closed ({status})")]
    ConversationClosed {
        conversation_id: String,
        status: ConversationStatus,
    },

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed or semantically invalid request payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The conversation changed between load and commit.
    #[error("conversation {conversation_id} was modified concurrently")]
    Conflict { conversation_id: String },

    /// The messenger is switched off in its settings.
    #[error("messenger unavailable: {0}")]
    Unavailable(String),

    /// No credentials were presented, or they were not recognized.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller is authenticated but lacks the required grant.
    #[error("permission denied: {action} on {resource}")]
    PermissionDenied { resource: String, action: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM or embedding provider errors (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MessengerError {
    /// Shorthand for a [`MessengerError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`MessengerError::WorkflowConfig`].
    pub fn workflow(message: impl Into<String>) -> Self {
        Self::WorkflowConfig(message.into())
    }
}
