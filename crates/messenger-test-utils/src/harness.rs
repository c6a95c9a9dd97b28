// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the engine stack over a temp SQLite database
//! seeded with the booking workflow:
//!
//! ```text
//! ASK_NAME (free text) -> ASK_PHONE (israeli_phone) -> CONFIRM (yes / no)
//! ```

use std::sync::Arc;

use messenger_config::model::{MessengerConfig, StorageConfig};
use messenger_core::types::{
    Choice, FaqDraft, LocalizedText, ModuleDefinition, ModuleDraft, StepDraft, WorkflowDraft,
};
use messenger_core::{EmbeddingAdapter, MessengerError, StorageAdapter};
use messenger_engine::types::{StartRequest, StartResponse, TurnResponse, UserMessage};
use messenger_engine::{AgentDesk, Engine};
use messenger_faq::{FaqRetriever, FaqSync};
use messenger_storage::SqliteStorage;

use crate::mock_embedder::MockEmbedder;
use crate::mock_provider::MockProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    embedder: bool,
    config: MessengerConfig,
    faqs: Vec<FaqDraft>,
    seed_workflow: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            embedder: false,
            config: MessengerConfig::default(),
            faqs: Vec::new(),
            seed_workflow: true,
        }
    }

    /// Set mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Use the deterministic embedder for FAQ lookups.
    pub fn with_embedder(mut self) -> Self {
        self.embedder = true;
        self
    }

    pub fn with_config(mut self, config: MessengerConfig) -> Self {
        self.config = config;
        self
    }

    /// FAQ entries created (and embedded) at build time.
    pub fn with_faq(mut self, draft: FaqDraft) -> Self {
        self.faqs.push(draft);
        self
    }

    /// Skip the booking workflow, leaving no active workflow.
    pub fn without_workflow(mut self) -> Self {
        self.seed_workflow = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, MessengerError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| MessengerError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let mut config = self.config;
        config.storage = storage_config.clone();
        let sqlite = SqliteStorage::new(storage_config);
        sqlite.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(sqlite);

        let workflow_id = if self.seed_workflow {
            Some(seed_booking(storage.as_ref()).await?)
        } else {
            None
        };

        let mock_embedder = self.embedder.then(|| Arc::new(MockEmbedder::new()));
        let embedder = mock_embedder
            .clone()
            .map(|e| e as Arc<dyn EmbeddingAdapter>);
        let faq_sync = Arc::new(FaqSync::new(
            storage.clone(),
            embedder.clone(),
            config.embedding.sync_retries,
        ));
        for draft in &self.faqs {
            let entry = storage.create_faq(draft).await?;
            if faq_sync.is_enabled() {
                faq_sync.sync_entry(&entry).await?;
            }
        }
        let faq = Arc::new(FaqRetriever::new(
            storage.clone(),
            embedder,
            &config.embedding,
        ));

        let mock_provider = Arc::new(if self.responses.is_empty() {
            MockProvider::new()
        } else {
            MockProvider::with_responses(self.responses)
        });

        let engine = Arc::new(
            Engine::builder(storage.clone(), &config.engine)
                .provider(mock_provider.clone())
                .faq(faq.clone())
                .build(),
        );
        let desk = AgentDesk::new(storage.clone(), config.engine.auto_resume_minutes);

        Ok(TestHarness {
            mock_provider,
            mock_embedder,
            storage,
            engine,
            desk,
            faq,
            faq_sync,
            config,
            workflow_id,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub mock_provider: Arc<MockProvider>,
    pub mock_embedder: Option<Arc<MockEmbedder>>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub engine: Arc<Engine>,
    pub desk: AgentDesk,
    pub faq: Arc<FaqRetriever>,
    pub faq_sync: Arc<FaqSync>,
    pub config: MessengerConfig,
    /// Id of the seeded booking workflow.
    pub workflow_id: Option<String>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Start (or resume) the conversation of `session_id` in English.
    pub async fn start(&self, session_id: &str) -> Result<StartResponse, MessengerError> {
        self.engine
            .start_conversation(&StartRequest {
                session_id: session_id.to_string(),
                branch_id: None,
                contact_id: None,
                locale: Some("en".into()),
            })
            .await
    }

    pub async fn reply(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<TurnResponse, MessengerError> {
        self.engine
            .process_user_message(&UserMessage {
                conversation_id: conversation_id.to_string(),
                message: text.to_string(),
                choice_id: None,
            })
            .await
    }

    pub async fn choose(
        &self,
        conversation_id: &str,
        choice_id: &str,
    ) -> Result<TurnResponse, MessengerError> {
        self.engine
            .process_user_message(&UserMessage {
                conversation_id: conversation_id.to_string(),
                message: String::new(),
                choice_id: Some(choice_id.to_string()),
            })
            .await
    }
}

fn text(fr: &str, en: &str, he: &str) -> LocalizedText {
    LocalizedText {
        fr: Some(fr.to_string()),
        en: Some(en.to_string()),
        he: Some(he.to_string()),
    }
}

fn module(ref_code: &str, content: LocalizedText, definition: ModuleDefinition) -> ModuleDraft {
    ModuleDraft {
        ref_code: ref_code.into(),
        name: ref_code.into(),
        content,
        params: serde_json::Value::Null,
        definition,
        custom_error_message: None,
        success_message: None,
        failure_message: None,
        category: "booking".into(),
        is_active: true,
    }
}

fn step(step_ref: &str, module_ref: &str, next: Option<&str>) -> StepDraft {
    StepDraft {
        step_ref: step_ref.into(),
        step_name: step_ref.into(),
        module_ref: module_ref.into(),
        is_entry_point: false,
        order_index: None,
        next_step_ref: next.map(str::to_string),
    }
}

/// Seeds the booking workflow as the active one and returns its id.
pub async fn seed_booking(storage: &dyn StorageAdapter) -> Result<String, MessengerError> {
    let workflow = storage
        .create_workflow(&WorkflowDraft {
            name: "Booking".into(),
            description: Some("Name, phone, confirmation".into()),
            is_active: true,
        })
        .await?;

    let mut confirm = module(
        "CONFIRM",
        text(
            "Confirmer la réservation ?",
            "Confirm the booking?",
            "לאשר את ההזמנה?",
        ),
        ModuleDefinition::Choice {
            choices: vec![
                Choice {
                    id: "yes".into(),
                    label: text("Oui", "Yes", "כן"),
                    next_step_ref: None,
                },
                Choice {
                    id: "no".into(),
                    label: text("Non", "No", "לא"),
                    next_step_ref: None,
                },
            ],
        },
    );
    confirm.success_message = Some(text(
        "Merci, à bientôt !",
        "Thank you, see you soon!",
        "תודה, להתראות!",
    ));

    for draft in [
        module(
            "NAME",
            text(
                "Comment vous appelez-vous ?",
                "What is your name?",
                "מה שמך?",
            ),
            ModuleDefinition::FreeText,
        ),
        module(
            "PHONE",
            text(
                "Merci {{ASK_NAME}}, votre numéro de téléphone ?",
                "Thanks {{ASK_NAME}}, what is your phone number?",
                "תודה {{ASK_NAME}}, מה מספר הטלפון שלך?",
            ),
            ModuleDefinition::ValidatedField {
                validation_format_code: "israeli_phone".into(),
            },
        ),
        confirm,
    ] {
        storage.create_module(&draft).await?;
    }

    for draft in [
        step("ASK_NAME", "NAME", Some("ASK_PHONE")),
        step("ASK_PHONE", "PHONE", Some("CONFIRM")),
        step("CONFIRM", "CONFIRM", None),
    ] {
        storage.create_step(&workflow.id, &draft).await?;
    }
    Ok(workflow.id)
}
