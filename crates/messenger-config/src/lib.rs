// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the messenger.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `MESSENGER_*` environment variable overrides, and
//! diagnostic error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use messenger_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.gateway.host, config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::MessengerConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment errors are converted into diagnostics that point into the TOML
/// source that caused them.
pub fn load_and_validate() -> Result<MessengerConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<MessengerConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Load configuration from an explicit file (plus env vars) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<MessengerConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

fn finish(
    loaded: Result<MessengerConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<MessengerConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string(loader::LOCAL_CONFIG_PATH) {
        let path = std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_CONFIG_PATH).display().to_string())
            .unwrap_or_else(|_| loader::LOCAL_CONFIG_PATH.to_string());
        sources.push((path, content));
    }

    if let Some(path) = loader::user_config_path() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            sources.push((path.display().to_string(), content));
        }
    }

    let system_path = Path::new(loader::SYSTEM_CONFIG_PATH);
    if let Ok(content) = std::fs::read_to_string(system_path) {
        sources.push((system_path.display().to_string(), content));
    }

    sources
}
