// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! bind hosts, paths, locales, thresholds, and API key grants.

use std::collections::HashSet;
use std::str::FromStr;

use messenger_core::types::{Locale, PermissionAction};

use crate::diagnostic::ConfigError;
use crate::model::MessengerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &MessengerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.logging.level.trim().to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if Locale::from_str(config.engine.default_locale.trim()).is_err() {
        errors.push(ConfigError::validation(format!(
            "engine.default_locale `{}` must be one of fr, en, he",
            config.engine.default_locale
        )));
    }

    if config.engine.handoff_marker.trim().is_empty() {
        errors.push(ConfigError::validation(
            "engine.handoff_marker must not be empty",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    validate_gateway(config, &mut errors);

    let threshold = config.embedding.match_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(ConfigError::validation(format!(
            "embedding.match_threshold must be between 0 and 1, got {threshold}"
        )));
    }

    if config.embedding.match_count == 0 {
        errors.push(ConfigError::validation(
            "embedding.match_count must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_gateway(config: &MessengerConfig, errors: &mut Vec<ConfigError>) {
    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    let mut names = HashSet::new();
    let mut tokens = HashSet::new();
    for (i, key) in config.gateway.api_keys.iter().enumerate() {
        if key.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "gateway.api_keys[{i}].name must not be empty"
            )));
        } else if !names.insert(key.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate API key name `{}` in [[gateway.api_keys]]",
                key.name
            )));
        }

        if key.token.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "gateway.api_keys[{i}].token must not be empty"
            )));
        } else if !tokens.insert(key.token.as_str()) {
            errors.push(ConfigError::validation(format!(
                "API key `{}` reuses a token of another key",
                key.name
            )));
        }

        for grant in &key.grants {
            if !is_valid_grant(grant) {
                errors.push(ConfigError::validation(format!(
                    "API key `{}` has malformed grant `{grant}` (expected resource:action)",
                    key.name
                )));
            }
        }
    }
}

/// A grant is `resource:action` where either side may be `*`.
fn is_valid_grant(grant: &str) -> bool {
    let Some((resource, action)) = grant.split_once(':') else {
        return false;
    };
    let resource_ok = resource == "*"
        || (!resource.is_empty()
            && resource
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    let action_ok = action == "*" || PermissionAction::from_str(action).is_ok();
    resource_ok && action_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApiKeyConfig;

    fn key(name: &str, token: &str, grants: &[&str]) -> ApiKeyConfig {
        ApiKeyConfig {
            name: name.to_string(),
            token: token.to_string(),
            grants: grants.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&MessengerConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = MessengerConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn unknown_default_locale_fails_validation() {
        let mut config = MessengerConfig::default();
        config.engine.default_locale = "de".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "default_locale"));
    }

    #[test]
    fn threshold_out_of_range_and_zero_count_are_both_reported() {
        let mut config = MessengerConfig::default();
        config.embedding.match_threshold = 1.5;
        config.embedding.match_count = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(has_message(&errors, "match_threshold"));
        assert!(has_message(&errors, "match_count"));
    }

    #[test]
    fn duplicate_key_names_and_tokens_fail_validation() {
        let mut config = MessengerConfig::default();
        config.gateway.api_keys = vec![
            key("desk", "tok-1", &["conversations:view"]),
            key("desk", "tok-1", &["messenger:*"]),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "duplicate API key name"));
        assert!(has_message(&errors, "reuses a token"));
    }

    #[test]
    fn grant_syntax_is_checked() {
        assert!(is_valid_grant("messenger:edit"));
        assert!(is_valid_grant("*:*"));
        assert!(is_valid_grant("conversations:*"));
        assert!(!is_valid_grant("messenger"));
        assert!(!is_valid_grant("messenger:publish"));
        assert!(!is_valid_grant(":view"));

        let mut config = MessengerConfig::default();
        config.gateway.api_keys = vec![key("admin", "tok", &["messenger"])];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "malformed grant"));
    }

    #[test]
    fn invalid_host_fails_validation() {
        let mut config = MessengerConfig::default();
        config.gateway.host = "bad host!".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "gateway.host"));
    }

    #[test]
    fn api_key_debug_redacts_token() {
        let rendered = format!("{:?}", key("desk", "super-secret", &[]));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
