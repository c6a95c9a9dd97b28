// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./messenger.toml` > `~/.config/messenger/messenger.toml`
//! > `/etc/messenger/messenger.toml` with environment variable overrides via the
//! `MESSENGER_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MessengerConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/messenger/messenger.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "messenger.toml";

/// Sections whose env vars map `MESSENGER_<SECTION>_<KEY>` to `<section>.<key>`.
const ENV_SECTIONS: &[&str] = &[
    "logging",
    "engine",
    "storage",
    "gateway",
    "anthropic",
    "embedding",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("messenger/messenger.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/messenger/messenger.toml` (system-wide)
/// 3. `~/.config/messenger/messenger.toml` (user XDG config)
/// 4. `./messenger.toml` (local directory)
/// 5. `MESSENGER_*` environment variables
pub fn load_config() -> Result<MessengerConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MessengerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MessengerConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MessengerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MessengerConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MessengerConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
///
/// Only the first underscore after a known section becomes a dot, so
/// `embedding_api_key` maps to `embedding.api_key`, not `embedding.api.key`.
pub fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("MESSENGER_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_first_underscore_only() {
        assert_eq!(map_env_key("gateway_port"), "gateway.port");
        assert_eq!(map_env_key("embedding_api_key"), "embedding.api_key");
        assert_eq!(
            map_env_key("engine_escalate_on_faq_miss"),
            "engine.escalate_on_faq_miss"
        );
        assert_eq!(map_env_key("unknown_key"), "unknown_key");
    }
}
