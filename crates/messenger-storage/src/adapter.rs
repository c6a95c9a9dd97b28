// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use messenger_config::model::StorageConfig;
use messenger_core::types::{
    Conversation, ConversationFilter, ConversationStatus, FaqDraft, FaqEntry, Message,
    MessengerSettings, Module, ModuleDraft, NewConversation, NewMessage, StepDraft,
    ValidationFormat, Workflow, WorkflowDraft, WorkflowStep,
};
use messenger_core::{AdapterType, HealthStatus, MessengerError, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates every operation to the typed
/// query modules. The database is opened by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, MessengerError> {
        self.db.get().ok_or_else(|| MessengerError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MessengerError> {
        self.db()?
            .call(|conn| conn.execute_batch("SELECT 1;"))
            .await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MessengerError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), MessengerError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MessengerError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), MessengerError> {
        self.db()?.checkpoint().await
    }

    // --- Workflow operations ---

    async fn list_workflows(&self) -> Result<Vec<Workflow>, MessengerError> {
        queries::workflows::list_workflows(self.db()?).await
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, MessengerError> {
        queries::workflows::get_workflow(self.db()?, id).await
    }

    async fn get_active_workflow(&self) -> Result<Option<Workflow>, MessengerError> {
        queries::workflows::get_active_workflow(self.db()?).await
    }

    async fn create_workflow(&self, draft: &WorkflowDraft) -> Result<Workflow, MessengerError> {
        queries::workflows::create_workflow(self.db()?, draft).await
    }

    async fn update_workflow(
        &self,
        id: &str,
        draft: &WorkflowDraft,
    ) -> Result<Workflow, MessengerError> {
        queries::workflows::update_workflow(self.db()?, id, draft).await
    }

    async fn activate_workflow(&self, id: &str) -> Result<Workflow, MessengerError> {
        queries::workflows::activate_workflow(self.db()?, id).await
    }

    async fn delete_workflow(&self, id: &str) -> Result<(), MessengerError> {
        queries::workflows::delete_workflow(self.db()?, id).await
    }

    // --- Step operations ---

    async fn list_steps(&self, workflow_id: &str) -> Result<Vec<WorkflowStep>, MessengerError> {
        queries::steps::list_steps(self.db()?, workflow_id).await
    }

    async fn get_step(
        &self,
        workflow_id: &str,
        step_ref: &str,
    ) -> Result<Option<WorkflowStep>, MessengerError> {
        queries::steps::get_step(self.db()?, workflow_id, step_ref).await
    }

    async fn get_step_by_id(&self, id: &str) -> Result<Option<WorkflowStep>, MessengerError> {
        queries::steps::get_step_by_id(self.db()?, id).await
    }

    async fn get_entry_step(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowStep>, MessengerError> {
        queries::steps::get_entry_step(self.db()?, workflow_id).await
    }

    async fn create_step(
        &self,
        workflow_id: &str,
        draft: &StepDraft,
    ) -> Result<WorkflowStep, MessengerError> {
        queries::steps::create_step(self.db()?, workflow_id, draft).await
    }

    async fn update_step(
        &self,
        id: &str,
        draft: &StepDraft,
    ) -> Result<WorkflowStep, MessengerError> {
        queries::steps::update_step(self.db()?, id, draft).await
    }

    async fn delete_step(&self, id: &str) -> Result<(), MessengerError> {
        queries::steps::delete_step(self.db()?, id).await
    }

    // --- Module operations ---

    async fn list_modules(&self) -> Result<Vec<Module>, MessengerError> {
        queries::modules::list_modules(self.db()?).await
    }

    async fn get_module(&self, id: &str) -> Result<Option<Module>, MessengerError> {
        queries::modules::get_module(self.db()?, id).await
    }

    async fn get_module_by_ref(&self, ref_code: &str) -> Result<Option<Module>, MessengerError> {
        queries::modules::get_module_by_ref(self.db()?, ref_code).await
    }

    async fn create_module(&self, draft: &ModuleDraft) -> Result<Module, MessengerError> {
        queries::modules::create_module(self.db()?, draft).await
    }

    async fn update_module(&self, id: &str, draft: &ModuleDraft) -> Result<Module, MessengerError> {
        queries::modules::update_module(self.db()?, id, draft).await
    }

    async fn delete_module(&self, id: &str) -> Result<(), MessengerError> {
        queries::modules::delete_module(self.db()?, id).await
    }

    // --- Validation format operations ---

    async fn list_validation_formats(
        &self,
        active_only: bool,
    ) -> Result<Vec<ValidationFormat>, MessengerError> {
        queries::formats::list_validation_formats(self.db()?, active_only).await
    }

    async fn get_validation_format(
        &self,
        format_code: &str,
    ) -> Result<Option<ValidationFormat>, MessengerError> {
        queries::formats::get_validation_format(self.db()?, format_code).await
    }

    async fn upsert_validation_format(
        &self,
        format: &ValidationFormat,
    ) -> Result<ValidationFormat, MessengerError> {
        queries::formats::upsert_validation_format(self.db()?, format).await
    }

    async fn delete_validation_format(&self, format_code: &str) -> Result<(), MessengerError> {
        queries::formats::delete_validation_format(self.db()?, format_code).await
    }

    // --- Settings operations ---

    async fn get_settings(&self) -> Result<MessengerSettings, MessengerError> {
        queries::settings::get_settings(self.db()?).await
    }

    async fn update_settings(
        &self,
        settings: &MessengerSettings,
    ) -> Result<MessengerSettings, MessengerError> {
        queries::settings::update_settings(self.db()?, settings).await
    }

    // --- Conversation operations ---

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, MessengerError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn find_active_conversation(
        &self,
        session_id: &str,
    ) -> Result<Option<Conversation>, MessengerError> {
        queries::conversations::find_active_conversation(self.db()?, session_id).await
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, MessengerError> {
        queries::conversations::list_conversations(self.db()?, filter).await
    }

    async fn create_conversation(
        &self,
        new: &NewConversation,
        first_message: &NewMessage,
    ) -> Result<Conversation, MessengerError> {
        queries::conversations::create_conversation(self.db()?, new, first_message).await
    }

    async fn commit_turn(
        &self,
        conversation: &Conversation,
        messages: &[NewMessage],
    ) -> Result<Conversation, MessengerError> {
        queries::conversations::commit_turn(self.db()?, conversation, messages).await
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<Message, MessengerError> {
        queries::conversations::append_message(self.db()?, conversation_id, message).await
    }

    async fn agent_send(
        &self,
        conversation_id: &str,
        message: &NewMessage,
        paused_until: DateTime<Utc>,
    ) -> Result<(Conversation, Message), MessengerError> {
        queries::conversations::agent_send(self.db()?, conversation_id, message, paused_until)
            .await
    }

    async fn set_clara_paused(
        &self,
        conversation_id: &str,
        paused: bool,
        paused_until: Option<DateTime<Utc>>,
    ) -> Result<Conversation, MessengerError> {
        queries::conversations::set_clara_paused(self.db()?, conversation_id, paused, paused_until)
            .await
    }

    async fn resolve_human(&self, conversation_id: &str) -> Result<Conversation, MessengerError> {
        queries::conversations::resolve_human(self.db()?, conversation_id).await
    }

    async fn close_conversation(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, MessengerError> {
        queries::conversations::close_conversation(self.db()?, conversation_id, status).await
    }

    async fn link_contact(
        &self,
        conversation_id: &str,
        contact_id: &str,
        branch_id: Option<&str>,
    ) -> Result<Conversation, MessengerError> {
        queries::conversations::link_contact(self.db()?, conversation_id, contact_id, branch_id)
            .await
    }

    // --- Message operations ---

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, MessengerError> {
        queries::messages::list_messages(self.db()?, conversation_id).await
    }

    // --- FAQ operations ---

    async fn list_faqs(&self, active_only: bool) -> Result<Vec<FaqEntry>, MessengerError> {
        queries::faq::list_faqs(self.db()?, active_only).await
    }

    async fn get_faq(&self, id: &str) -> Result<Option<FaqEntry>, MessengerError> {
        queries::faq::get_faq(self.db()?, id).await
    }

    async fn create_faq(&self, draft: &FaqDraft) -> Result<FaqEntry, MessengerError> {
        queries::faq::create_faq(self.db()?, draft).await
    }

    async fn update_faq(&self, id: &str, draft: &FaqDraft) -> Result<FaqEntry, MessengerError> {
        queries::faq::update_faq(self.db()?, id, draft).await
    }

    async fn delete_faq(&self, id: &str) -> Result<(), MessengerError> {
        queries::faq::delete_faq(self.db()?, id).await
    }

    async fn set_faq_embedding(&self, id: &str, embedding: &[f32]) -> Result<(), MessengerError> {
        queries::faq::set_faq_embedding(self.db()?, id, embedding).await
    }

    async fn list_faq_embeddings(&self) -> Result<Vec<FaqEntry>, MessengerError> {
        queries::faq::list_faq_embeddings(self.db()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_core::types::Locale;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        assert!(storage.list_workflows().await.is_err());
        // Shutdown without a database is a no-op.
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn conversation_lifecycle_through_the_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);

        let wf = storage
            .create_workflow(&WorkflowDraft {
                name: "intake".into(),
                description: None,
                is_active: true,
            })
            .await
            .unwrap();
        let conv = storage
            .create_conversation(
                &NewConversation {
                    session_id: "s".into(),
                    branch_id: None,
                    contact_id: None,
                    workflow_id: wf.id.clone(),
                    entry_step_ref: "WELCOME".into(),
                    locale: Locale::He,
                },
                &NewMessage::assistant("שלום", Some("WELCOME".into())),
            )
            .await
            .unwrap();

        let closed = storage
            .close_conversation(&conv.id, ConversationStatus::Completed)
            .await
            .unwrap();
        assert_eq!(closed.status, ConversationStatus::Completed);
        assert_eq!(storage.list_messages(&conv.id).await.unwrap().len(), 1);

        storage.close().await.unwrap();
        storage.shutdown().await.unwrap();
    }
}
