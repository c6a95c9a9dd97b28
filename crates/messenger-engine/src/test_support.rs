// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seeded workflows and stub adapters for engine tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use messenger_config::model::{EngineConfig, StorageConfig};
use messenger_core::types::{
    AdapterType, Choice, HealthStatus, LocalizedText, ModuleDefinition, ModuleDraft,
    ProviderRequest, ProviderResponse, StepDraft, TokenUsage, WorkflowDraft,
};
use messenger_core::{MessengerError, PluginAdapter, ProviderAdapter, StorageAdapter};
use messenger_storage::SqliteStorage;
use tempfile::TempDir;

use crate::machine::Engine;

/// Returns a fixed reply (or error) and records the last request.
pub struct ScriptedProvider {
    reply: Result<String, String>,
    pub last: Mutex<Option<ProviderRequest>>,
}

#[async_trait]
impl PluginAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
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
impl ProviderAdapter for ScriptedProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MessengerError> {
        *self.last.lock().unwrap() = Some(request);
        match &self.reply {
            Ok(text) => Ok(ProviderResponse {
                id: "r1".into(),
                content: text.clone(),
                model: "scripted".into(),
                stop_reason: Some("end_turn".into()),
                usage: TokenUsage::default(),
            }),
            Err(message) => Err(MessengerError::Provider {
                message: message.clone(),
                source: None,
            }),
        }
    }
}

pub fn scripted(reply: Result<&str, &str>) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider {
        reply: reply.map(str::to_string).map_err(str::to_string),
        last: Mutex::new(None),
    })
}

pub fn text(fr: &str, en: &str) -> LocalizedText {
    LocalizedText {
        fr: Some(fr.to_string()),
        en: Some(en.to_string()),
        he: None,
    }
}

pub fn module(ref_code: &str, content: LocalizedText, definition: ModuleDefinition) -> ModuleDraft {
    ModuleDraft {
        ref_code: ref_code.into(),
        name: ref_code.into(),
        content,
        params: serde_json::Value::Null,
        definition,
        custom_error_message: None,
        success_message: None,
        failure_message: None,
        category: "general".into(),
        is_active: true,
    }
}

pub fn step(step_ref: &str, module_ref: &str, next: Option<&str>) -> StepDraft {
    StepDraft {
        step_ref: step_ref.into(),
        step_name: step_ref.into(),
        module_ref: module_ref.into(),
        is_entry_point: false,
        order_index: None,
        next_step_ref: next.map(str::to_string),
    }
}

pub struct Fixture {
    _dir: TempDir,
    pub storage: Arc<SqliteStorage>,
    pub config: EngineConfig,
}

impl Fixture {
    /// A migrated database with no workflow.
    pub async fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("engine.db").to_str().unwrap().to_string(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        Self {
            _dir: dir,
            storage: Arc::new(storage),
            config: EngineConfig::default(),
        }
    }

    /// Creates an active workflow from `modules` and `steps`, first step first.
    pub async fn with_workflow(modules: Vec<ModuleDraft>, steps: Vec<StepDraft>) -> Self {
        let fx = Self::empty().await;
        let workflow = fx
            .storage
            .create_workflow(&WorkflowDraft {
                name: "Test".into(),
                description: None,
                is_active: true,
            })
            .await
            .unwrap();
        for draft in &modules {
            fx.storage.create_module(draft).await.unwrap();
        }
        for draft in &steps {
            fx.storage.create_step(&workflow.id, draft).await.unwrap();
        }
        fx
    }

    /// ASK_NAME (free text) -> ASK_PHONE (israeli_phone) -> CONFIRM (yes/no).
    pub async fn booking() -> Self {
        let mut confirm = module(
            "CONFIRM",
            text("Confirmer ?", "Confirm?"),
            ModuleDefinition::Choice {
                choices: vec![
                    Choice {
                        id: "yes".into(),
                        label: text("Oui", "Yes"),
                        next_step_ref: None,
                    },
                    Choice {
                        id: "no".into(),
                        label: text("Non", "No"),
                        next_step_ref: None,
                    },
                ],
            },
        );
        confirm.success_message = Some(text("À bientôt !", "See you soon!"));

        Self::with_workflow(
            vec![
                module(
                    "NAME",
                    text("Comment vous appelez-vous ?", "What is your name?"),
                    ModuleDefinition::FreeText,
                ),
                module(
                    "PHONE",
                    text(
                        "Merci {{ASK_NAME}}, votre numéro ?",
                        "Thanks {{ASK_NAME}}, your phone number?",
                    ),
                    ModuleDefinition::ValidatedField {
                        validation_format_code: "israeli_phone".into(),
                    },
                ),
                confirm,
            ],
            vec![
                step("ASK_NAME", "NAME", Some("ASK_PHONE")),
                step("ASK_PHONE", "PHONE", Some("CONFIRM")),
                step("CONFIRM", "CONFIRM", None),
            ],
        )
        .await
    }

    /// PICK (a -> stepX, b -> stepY, default stepX).
    pub async fn branching() -> Self {
        let choice = |id: &str, next: &str| Choice {
            id: id.into(),
            label: text(id, id),
            next_step_ref: Some(next.into()),
        };
        Self::with_workflow(
            vec![
                module(
                    "PICK",
                    text("Choisissez", "Pick one"),
                    ModuleDefinition::Choice {
                        choices: vec![choice("a", "stepX"), choice("b", "stepY")],
                    },
                ),
                module("END", text("Fin", "End"), ModuleDefinition::FreeText),
            ],
            vec![
                step("PICK", "PICK", Some("stepX")),
                step("stepX", "END", None),
                step("stepY", "END", None),
            ],
        )
        .await
    }

    /// A single delegated INFO step.
    pub async fn delegated() -> Self {
        Self::with_workflow(
            vec![module(
                "INFO",
                text("Posez votre question", "Ask your question"),
                ModuleDefinition::LlmDelegated {
                    llm_config: Default::default(),
                },
            )],
            vec![step("INFO", "INFO", None)],
        )
        .await
    }

    pub fn engine(&self) -> Engine {
        Engine::builder(self.storage.clone(), &self.config).build()
    }

    pub fn engine_with(&self, provider: Arc<ScriptedProvider>) -> Engine {
        Engine::builder(self.storage.clone(), &self.config)
            .provider(provider)
            .build()
    }
}
