// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, engine, and gateway crates.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MessengerError;

/// Captured answers of a conversation, keyed by the step that collected them.
pub type CollectedData = BTreeMap<String, String>;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Embedding,
    Auth,
}

// --- Locales ---

/// Languages the messenger speaks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    Fr,
    En,
    He,
}

impl Locale {
    /// All supported locales, in fallback order after the preferred ones.
    pub const ALL: [Locale; 3] = [Locale::En, Locale::Fr, Locale::He];

    /// Maps a client-supplied language tag onto a supported locale.
    ///
    /// `fr-CA` becomes `fr`, `he`/`iw` variants become `he`, everything else is `en`.
    pub fn normalize(tag: &str) -> Locale {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.starts_with("fr") {
            Locale::Fr
        } else if tag.starts_with("he") || tag.starts_with("iw") {
            Locale::He
        } else {
            Locale::En
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Fr => "fr",
            Locale::En => "en",
            Locale::He => "he",
        }
    }
}

/// Text with one optional translation per locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalizedText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub he: Option<String>,
}

impl LocalizedText {
    /// Builds a text with a single translation.
    pub fn single(locale: Locale, text: impl Into<String>) -> Self {
        let mut out = Self::default();
        out.set(locale, text);
        out
    }

    pub fn set(&mut self, locale: Locale, text: impl Into<String>) {
        let text = Some(text.into());
        match locale {
            Locale::Fr => self.fr = text,
            Locale::En => self.en = text,
            Locale::He => self.he = text,
        }
    }

    /// Returns the non-blank translation for `locale`, if any.
    pub fn get(&self, locale: Locale) -> Option<&str> {
        let value = match locale {
            Locale::Fr => self.fr.as_deref(),
            Locale::En => self.en.as_deref(),
            Locale::He => self.he.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Resolves the best translation: `locale`, then `fallback`, then any other
    /// locale, then the empty string.
    pub fn resolve(&self, locale: Locale, fallback: Locale) -> &str {
        self.get(locale)
            .or_else(|| self.get(fallback))
            .or_else(|| Locale::ALL.iter().find_map(|l| self.get(*l)))
            .unwrap_or("")
    }

    /// Iterates over all present translations.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        [self.fr.as_deref(), self.en.as_deref(), self.he.as_deref()]
            .into_iter()
            .flatten()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values().next().is_none()
    }
}

// --- Workflows and steps ---

/// A conversation template: a graph of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin payload for creating or replacing a workflow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl WorkflowDraft {
    pub fn validate(&self) -> Result<(), MessengerError> {
        if self.name.trim().is_empty() {
            return Err(MessengerError::InvalidInput(
                "workflow name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// One node of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub workflow_id: String,
    pub step_ref: String,
    pub step_name: String,
    pub module_ref: String,
    pub is_entry_point: bool,
    /// Display order only; routing never depends on it.
    pub order_index: i64,
    /// Default successor when the module does not pick one.
    pub next_step_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Admin payload for creating or replacing a step.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepDraft {
    pub step_ref: String,
    #[serde(default)]
    pub step_name: String,
    pub module_ref: String,
    #[serde(default)]
    pub is_entry_point: bool,
    #[serde(default)]
    pub order_index: Option<i64>,
    #[serde(default)]
    pub next_step_ref: Option<String>,
}

impl StepDraft {
    pub fn validate(&self) -> Result<(), MessengerError> {
        if self.step_ref.trim().is_empty() {
            return Err(MessengerError::InvalidInput(
                "step_ref must not be empty".into(),
            ));
        }
        if self.module_ref.trim().is_empty() {
            return Err(MessengerError::InvalidInput(
                "module_ref must not be empty".into(),
            ));
        }
        if self.next_step_ref.as_deref() == Some(self.step_ref.as_str()) {
            return Err(MessengerError::InvalidInput(format!(
                "step `{}` cannot be its own default successor",
                self.step_ref
            )));
        }
        Ok(())
    }
}

// --- Modules ---

/// Discriminant of [`ModuleDefinition`], as stored and reported to clients.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModuleType {
    FreeText,
    Choice,
    ValidatedField,
    LlmDelegated,
}

/// One option of a multiple-choice module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub label: LocalizedText,
    /// Step to jump to when this choice is picked, overriding the step default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_ref: Option<String>,
}

/// Settings for a module handed off to the LLM assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub use_faq_context: bool,
}

/// Type-specific behavior of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module_type", rename_all = "snake_case")]
pub enum ModuleDefinition {
    /// Any non-empty reply is accepted.
    FreeText,
    /// The reply must pick one of the declared choices.
    Choice { choices: Vec<Choice> },
    /// The reply must pass the referenced validation format.
    ValidatedField { validation_format_code: String },
    /// The reply is answered by the LLM assistant.
    LlmDelegated {
        #[serde(default)]
        llm_config: LlmConfig,
    },
}

impl ModuleDefinition {
    pub fn module_type(&self) -> ModuleType {
        match self {
            ModuleDefinition::FreeText => ModuleType::FreeText,
            ModuleDefinition::Choice { .. } => ModuleType::Choice,
            ModuleDefinition::ValidatedField { .. } => ModuleType::ValidatedField,
            ModuleDefinition::LlmDelegated { .. } => ModuleType::LlmDelegated,
        }
    }

    /// Reassembles a definition from its stored columns.
    pub fn from_parts(
        module_type: ModuleType,
        validation_format_code: Option<String>,
        choices: Option<Vec<Choice>>,
        llm_config: Option<LlmConfig>,
    ) -> Result<Self, MessengerError> {
        match module_type {
            ModuleType::FreeText => Ok(ModuleDefinition::FreeText),
            ModuleType::Choice => Ok(ModuleDefinition::Choice {
                choices: choices.unwrap_or_default(),
            }),
            ModuleType::ValidatedField => validation_format_code
                .map(|code| ModuleDefinition::ValidatedField {
                    validation_format_code: code,
                })
                .ok_or_else(|| {
                    MessengerError::workflow("validated field module without a format code")
                }),
            ModuleType::LlmDelegated => Ok(ModuleDefinition::LlmDelegated {
                llm_config: llm_config.unwrap_or_default(),
            }),
        }
    }

    pub fn validation_format_code(&self) -> Option<&str> {
        match self {
            ModuleDefinition::ValidatedField {
                validation_format_code,
            } => Some(validation_format_code),
            _ => None,
        }
    }

    pub fn choices(&self) -> Option<&[Choice]> {
        match self {
            ModuleDefinition::Choice { choices } => Some(choices),
            _ => None,
        }
    }

    pub fn llm_config(&self) -> Option<&LlmConfig> {
        match self {
            ModuleDefinition::LlmDelegated { llm_config } => Some(llm_config),
            _ => None,
        }
    }
}

/// A reusable prompt definition referenced by steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub ref_code: String,
    pub name: String,
    pub content: LocalizedText,
    pub params: serde_json::Value,
    #[serde(flatten)]
    pub definition: ModuleDefinition,
    pub custom_error_message: Option<LocalizedText>,
    pub success_message: Option<LocalizedText>,
    pub failure_message: Option<LocalizedText>,
    pub category: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn module_type(&self) -> ModuleType {
        self.definition.module_type()
    }
}

fn default_category() -> String {
    "general".to_string()
}

fn default_true() -> bool {
    true
}

/// Admin payload for creating or replacing a module.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleDraft {
    pub ref_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: LocalizedText,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(flatten)]
    pub definition: ModuleDefinition,
    #[serde(default)]
    pub custom_error_message: Option<LocalizedText>,
    #[serde(default)]
    pub success_message: Option<LocalizedText>,
    #[serde(default)]
    pub failure_message: Option<LocalizedText>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ModuleDraft {
    /// Checks the shape invariants that do not need the database.
    pub fn validate(&self) -> Result<(), MessengerError> {
        if self.ref_code.trim().is_empty() {
            return Err(MessengerError::InvalidInput(
                "ref_code must not be empty".into(),
            ));
        }
        match &self.definition {
            ModuleDefinition::Choice { choices } => {
                if choices.is_empty() {
                    return Err(MessengerError::InvalidInput(format!(
                        "choice module `{}` declares no choices",
                        self.ref_code
                    )));
                }
                let mut seen = HashSet::new();
                for choice in choices {
                    if choice.id.trim().is_empty() {
                        return Err(MessengerError::InvalidInput(format!(
                            "choice module `{}` has a choice without id",
                            self.ref_code
                        )));
                    }
                    if !seen.insert(choice.id.as_str()) {
                        return Err(MessengerError::InvalidInput(format!(
                            "choice module `{}` repeats choice id `{}`",
                            self.ref_code, choice.id
                        )));
                    }
                }
            }
            ModuleDefinition::ValidatedField {
                validation_format_code,
            } if validation_format_code.trim().is_empty() => {
                return Err(MessengerError::InvalidInput(format!(
                    "validated field module `{}` needs a validation_format_code",
                    self.ref_code
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

// --- Validation formats ---

/// A named rule for accepting and normalizing a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFormat {
    pub format_code: String,
    #[serde(default)]
    pub format_name: String,
    #[serde(default)]
    pub validation_regex: Option<String>,
    /// Identifier of a validator function registered with the engine.
    #[serde(default)]
    pub validation_function: Option<String>,
    #[serde(default)]
    pub error_message: LocalizedText,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ValidationFormat {
    pub fn validate(&self) -> Result<(), MessengerError> {
        if self.format_code.trim().is_empty() {
            return Err(MessengerError::InvalidInput(
                "format_code must not be empty".into(),
            ));
        }
        if self.validation_regex.is_none() && self.validation_function.is_none() {
            return Err(MessengerError::InvalidInput(format!(
                "format `{}` needs a validation_regex or a validation_function",
                self.format_code
            )));
        }
        Ok(())
    }
}

// --- Settings ---

/// Global messenger settings (single row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessengerSettings {
    pub is_active: bool,
    /// Delay the widget waits before showing the first message.
    pub welcome_delay_seconds: u32,
    /// Length of the pause window opened by an agent takeover.
    pub auto_resume_minutes: u32,
}

impl Default for MessengerSettings {
    fn default() -> Self {
        Self {
            is_active: true,
            welcome_delay_seconds: 2,
            auto_resume_minutes: 5,
        }
    }
}

// --- Conversations ---

/// Lifecycle of a conversation. Transitions only move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
    Abandoned,
}

impl ConversationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConversationStatus::Active)
    }
}

/// One user's run through a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub branch_id: Option<String>,
    pub contact_id: Option<String>,
    pub workflow_id: String,
    pub current_step_ref: Option<String>,
    pub status: ConversationStatus,
    pub locale: Locale,
    pub collected_data: CollectedData,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub clara_paused: bool,
    pub clara_paused_until: Option<DateTime<Utc>>,
    pub needs_human: bool,
    pub needs_human_reason: Option<String>,
    pub last_message: Option<String>,
    /// Optimistic-concurrency token, bumped by every write.
    pub version: i64,
}

/// Data required to open a conversation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub session_id: String,
    pub branch_id: Option<String>,
    pub contact_id: Option<String>,
    pub workflow_id: String,
    pub entry_step_ref: String,
    pub locale: Locale,
}

/// Filters for the agent desk conversation list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationFilter {
    #[serde(default)]
    pub status: Option<ConversationStatus>,
    #[serde(default)]
    pub needs_human: Option<bool>,
    #[serde(default)]
    pub limit: Option<u32>,
}

// --- Messages ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One persisted turn of a transcript. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub step_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A message about to be appended to a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub step_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>, step_ref: Option<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            step_ref,
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>, step_ref: Option<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            step_ref,
            metadata: None,
        }
    }

    /// A message typed by a human agent from the desk.
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            step_ref: None,
            metadata: Some(serde_json::json!({ "sent_by": "agent" })),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// --- FAQ ---

/// A frequently asked question with its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub category: String,
    pub question: LocalizedText,
    pub answer: LocalizedText,
    pub order_index: i64,
    pub is_active: bool,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FaqEntry {
    /// Text embedded for semantic lookup: every question translation, then
    /// every answer translation, space separated.
    pub fn embedding_text(&self) -> String {
        self.question
            .values()
            .chain(self.answer.values())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

/// Admin payload for creating or replacing a FAQ entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FaqDraft {
    #[serde(default = "default_category")]
    pub category: String,
    pub question: LocalizedText,
    pub answer: LocalizedText,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl FaqDraft {
    pub fn validate(&self) -> Result<(), MessengerError> {
        if self.question.is_empty() || self.answer.is_empty() {
            return Err(MessengerError::InvalidInput(
                "FAQ entries need a question and an answer".into(),
            ));
        }
        Ok(())
    }
}

// --- Provider types ---

/// One message of a provider conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A completion request sent to an LLM provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    /// Model override; the provider default is used when `None`.
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A full completion returned by an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

// --- Embedding types ---

/// Texts to embed in one batch.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Embeddings in input order.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

// --- Auth types ---

/// Credentials presented by a caller.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
}

/// A verified caller and its grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub name: String,
    pub grants: Vec<String>,
}

/// Action part of a `resource:action` grant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionAction {
    View,
    Create,
    Edit,
    Delete,
}
