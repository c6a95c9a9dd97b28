// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the messenger.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;
use std::str::FromStr;

use messenger_core::types::{Locale, LocalizedText};
use serde::{Deserialize, Serialize};

/// Top-level messenger configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Conversation engine behavior.
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway and its API keys.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Anthropic API settings for delegated modules.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Embedding provider settings for FAQ lookup.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Conversation engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Locale used when the client sends none and for missing translations.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Pause window in minutes, used when the settings row is unreadable.
    #[serde(default = "default_auto_resume_minutes")]
    pub auto_resume_minutes: u32,

    /// Flag conversations for a human when a free-text reply matches no FAQ.
    #[serde(default)]
    pub escalate_on_faq_miss: bool,

    /// Number of transcript messages sent to the delegated assistant.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Text the assistant emits to request a human agent.
    #[serde(default = "default_handoff_marker")]
    pub handoff_marker: String,

    /// Reply used when the assistant cannot answer.
    #[serde(default = "default_assistant_fallback_message")]
    pub assistant_fallback_message: LocalizedText,
}

impl EngineConfig {
    /// The configured default locale, `fr` when it does not parse.
    pub fn fallback_locale(&self) -> Locale {
        Locale::from_str(self.default_locale.trim()).unwrap_or(Locale::Fr)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            auto_resume_minutes: default_auto_resume_minutes(),
            escalate_on_faq_miss: false,
            history_limit: default_history_limit(),
            handoff_marker: default_handoff_marker(),
            assistant_fallback_message: default_assistant_fallback_message(),
        }
    }
}

fn default_locale() -> String {
    "fr".to_string()
}

fn default_auto_resume_minutes() -> u32 {
    5
}

fn default_history_limit() -> usize {
    20
}

fn default_handoff_marker() -> String {
    "[[HANDOFF]]".to_string()
}

fn default_assistant_fallback_message() -> LocalizedText {
    LocalizedText {
        fr: Some("Un conseiller va vous répondre très bientôt.".to_string()),
        en: Some("An agent will get back to you shortly.".to_string()),
        he: Some("נציג יחזור אליך בהקדם.".to_string()),
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("messenger").join("messenger.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("messenger.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Keys accepted on the admin and agent routes. Empty rejects them all.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            api_keys: Vec::new(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// A bearer token and the `resource:action` grants it carries.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub grants: Vec<String>,
}

impl fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("grants", &self.grants)
            .finish()
    }
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used when a module does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Embedding provider configuration (OpenAI-compatible `/embeddings` API).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// API key. `None` falls back to `OPENAI_API_KEY`; without either,
    /// FAQ lookup uses keyword matching only.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Minimum cosine similarity for a FAQ match.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Maximum number of FAQ matches returned by a search.
    #[serde(default = "default_match_count")]
    pub match_count: usize,

    /// Retries of a detached embedding sync before it gives up.
    #[serde(default = "default_sync_retries")]
    pub sync_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            sync_retries: default_sync_retries(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_match_threshold() -> f64 {
    0.3
}

fn default_match_count() -> usize {
    5
}

fn default_sync_retries() -> u32 {
    2
}
