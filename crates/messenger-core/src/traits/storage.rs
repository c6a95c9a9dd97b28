// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MessengerError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Conversation, ConversationFilter, ConversationStatus, FaqDraft, FaqEntry, Message,
    MessengerSettings, Module, ModuleDraft, NewConversation, NewMessage, StepDraft,
    ValidationFormat, Workflow, WorkflowDraft, WorkflowStep,
};

/// Adapter for storage and persistence backends.
///
/// Configuration entities (workflows, steps, modules, validation formats,
/// settings, FAQ) are admin-owned; conversations and messages are written by
/// the engine and by agent desk operations. Every multi-row change listed here
/// is applied atomically by the implementation.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), MessengerError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), MessengerError>;

    // --- Workflow operations ---

    async fn list_workflows(&self) -> Result<Vec<Workflow>, MessengerError>;

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, MessengerError>;

    /// Returns the single active workflow, if any.
    async fn get_active_workflow(&self) -> Result<Option<Workflow>, MessengerError>;

    /// Creates a workflow; an active draft deactivates every other workflow.
    async fn create_workflow(&self, draft: &WorkflowDraft) -> Result<Workflow, MessengerError>;

    /// Replaces a workflow's attributes; an active draft deactivates every other workflow.
    async fn update_workflow(
        &self,
        id: &str,
        draft: &WorkflowDraft,
    ) -> Result<Workflow, MessengerError>;

    /// Makes `id` the only active workflow.
    async fn activate_workflow(&self, id: &str) -> Result<Workflow, MessengerError>;

    /// Deletes a workflow and its steps.
    async fn delete_workflow(&self, id: &str) -> Result<(), MessengerError>;

    // --- Step operations ---

    /// Lists the steps of a workflow by order index.
    async fn list_steps(&self, workflow_id: &str) -> Result<Vec<WorkflowStep>, MessengerError>;

    async fn get_step(
        &self,
        workflow_id: &str,
        step_ref: &str,
    ) -> Result<Option<WorkflowStep>, MessengerError>;

    async fn get_step_by_id(&self, id: &str) -> Result<Option<WorkflowStep>, MessengerError>;

    async fn get_entry_step(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowStep>, MessengerError>;

    /// Creates a step. The first step of a workflow is always the entry point;
    /// a later step flagged as entry point clears the flag on its siblings.
    async fn create_step(
        &self,
        workflow_id: &str,
        draft: &StepDraft,
    ) -> Result<WorkflowStep, MessengerError>;

    async fn update_step(&self, id: &str, draft: &StepDraft)
    -> Result<WorkflowStep, MessengerError>;

    /// Deletes a step, promoting a sibling when the entry point is removed.
    async fn delete_step(&self, id: &str) -> Result<(), MessengerError>;

    // --- Module operations ---

    async fn list_modules(&self) -> Result<Vec<Module>, MessengerError>;

    async fn get_module(&self, id: &str) -> Result<Option<Module>, MessengerError>;

    async fn get_module_by_ref(&self, ref_code: &str) -> Result<Option<Module>, MessengerError>;

    async fn create_module(&self, draft: &ModuleDraft) -> Result<Module, MessengerError>;

    async fn update_module(&self, id: &str, draft: &ModuleDraft)
    -> Result<Module, MessengerError>;

    async fn delete_module(&self, id: &str) -> Result<(), MessengerError>;

    // --- Validation format operations ---

    async fn list_validation_formats(
        &self,
        active_only: bool,
    ) -> Result<Vec<ValidationFormat>, MessengerError>;

    async fn get_validation_format(
        &self,
        format_code: &str,
    ) -> Result<Option<ValidationFormat>, MessengerError>;

    async fn upsert_validation_format(
        &self,
        format: &ValidationFormat,
    ) -> Result<ValidationFormat, MessengerError>;

    async fn delete_validation_format(&self, format_code: &str) -> Result<(), MessengerError>;

    // --- Settings operations ---

    async fn get_settings(&self) -> Result<MessengerSettings, MessengerError>;

    async fn update_settings(
        &self,
        settings: &MessengerSettings,
    ) -> Result<MessengerSettings, MessengerError>;

    // --- Conversation operations ---

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, MessengerError>;

    /// Returns the most recent `active` conversation of a session.
    async fn find_active_conversation(
        &self,
        session_id: &str,
    ) -> Result<Option<Conversation>, MessengerError>;

    /// Lists conversations by last activity, newest first.
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, MessengerError>;

    /// Inserts a conversation together with its first assistant message.
    async fn create_conversation(
        &self,
        new: &NewConversation,
        first_message: &NewMessage,
    ) -> Result<Conversation, MessengerError>;

    /// Appends `messages` in order and writes the cursor fields of
    /// `conversation` in one transaction.
    ///
    /// The write only applies when the stored version still equals
    /// `conversation.version`; otherwise nothing is written and
    /// [`MessengerError::Conflict`] is returned. Returns the stored row.
    async fn commit_turn(
        &self,
        conversation: &Conversation,
        messages: &[NewMessage],
    ) -> Result<Conversation, MessengerError>;

    /// Appends one message outside of a turn commit.
    async fn append_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<Message, MessengerError>;

    /// Stores an agent message and opens or refreshes the pause window.
    async fn agent_send(
        &self,
        conversation_id: &str,
        message: &NewMessage,
        paused_until: DateTime<Utc>,
    ) -> Result<(Conversation, Message), MessengerError>;

    async fn set_clara_paused(
        &self,
        conversation_id: &str,
        paused: bool,
        paused_until: Option<DateTime<Utc>>,
    ) -> Result<Conversation, MessengerError>;

    /// Clears the needs-human flag and its reason.
    async fn resolve_human(&self, conversation_id: &str) -> Result<Conversation, MessengerError>;

    /// Moves an `active` conversation to a terminal status.
    ///
    /// Returns [`MessengerError::ConversationClosed`] if it is already terminal.
    async fn close_conversation(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, MessengerError>;

    async fn link_contact(
        &self,
        conversation_id: &str,
        contact_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Conversation, MessengerError>;

    // --- Message operations ---

    /// Returns the transcript in append order.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, MessengerError>;

    // --- FAQ operations ---

    /// Lists FAQ entries by order index.
    async fn list_faqs(&self, active_only: bool) -> Result<Vec<FaqEntry>, MessengerError>;

    async fn get_faq(&self, id: &str) -> Result<Option<FaqEntry>, MessengerError>;

    async fn create_faq(&self, draft: &FaqDraft) -> Result<FaqEntry, MessengerError>;

    async fn update_faq(&self, id: &str, draft: &FaqDraft) -> Result<FaqEntry, MessengerError>;

    async fn delete_faq(&self, id: &str) -> Result<(), MessengerError>;

    async fn set_faq_embedding(&self, id: &str, embedding: &[f32]) -> Result<(), MessengerError>;

    /// Active entries that carry an embedding.
    async fn list_faq_embeddings(&self) -> Result<Vec<FaqEntry>, MessengerError>;
}
